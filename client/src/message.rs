use derive_more::From;
use engine::{GenerationResult, Model};

#[derive(Debug, Clone, From)]
pub enum Message {
    Input(Input),
    Finished(Finished),
}

/// Things the user does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    PromptChanged(String),
    ToggleDropdown,
    CloseDropdown,
    SelectModel(Model),
    Generate,
}

/// Terminal result of the operation started for `generation`.
#[derive(Debug, Clone)]
pub struct Finished {
    pub generation: u64,
    pub result: GenerationResult,
}
