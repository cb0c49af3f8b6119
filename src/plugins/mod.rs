pub mod ledger;
pub mod nav;
pub mod node;
