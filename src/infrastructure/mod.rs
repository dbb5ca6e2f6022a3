pub mod ledger;
pub mod llm;
