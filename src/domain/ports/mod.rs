pub mod llm_client;
pub mod model_adapter;
pub mod opinion_ledger;
