pub mod excerpt;
pub mod guard;
pub mod ledger;
pub mod tree;
