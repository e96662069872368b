use engine::{FailureKind, GenerationResult, Model};
use log::debug;

use crate::message::{Finished, Input, Message};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Loading {
        generation: u64,
    },
    Succeeded {
        url: String,
    },
    Failed {
        message: String,
    },
}

/// Work the frontend has to carry out after an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    None,
    Generate(GenerateJob),
    /// Abort the running generation, its result is no longer wanted.
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateJob {
    pub generation: u64,
    pub prompt: String,
    pub model: Model,
}

/// Everything the view renders. Only ever changed through [`ViewState::update`].
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    prompt: String,
    model: Model,
    dropdown_open: bool,
    phase: Phase,
    generation: u64,
}

impl ViewState {
    pub fn new(model: Model) -> Self {
        Self {
            model,
            ..Default::default()
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn model(&self) -> Model {
        self.model
    }

    pub fn dropdown_open(&self) -> bool {
        self.dropdown_open
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.phase, Phase::Loading { .. })
    }

    pub fn update(&mut self, message: impl Into<Message>) -> Command {
        match message.into() {
            Message::Input(input) => self.on_input(input),
            Message::Finished(finished) => {
                self.on_finished(finished);
                Command::None
            }
        }
    }

    fn on_input(&mut self, input: Input) -> Command {
        use Input::*;
        match input {
            PromptChanged(prompt) => self.prompt = prompt,
            ToggleDropdown => self.dropdown_open = !self.dropdown_open,
            CloseDropdown => self.dropdown_open = false,
            SelectModel(model) => {
                self.model = model;
                self.dropdown_open = false;
            }
            Generate => {
                if self.prompt.trim().is_empty() {
                    let was_loading = self.is_loading();
                    self.phase = Phase::Failed {
                        message: "Please enter a prompt.".into(),
                    };
                    return if was_loading {
                        Command::Cancel
                    } else {
                        Command::None
                    };
                }

                self.generation += 1;
                self.phase = Phase::Loading {
                    generation: self.generation,
                };
                return Command::Generate(GenerateJob {
                    generation: self.generation,
                    prompt: self.prompt.clone(),
                    model: self.model,
                });
            }
        }
        Command::None
    }

    fn on_finished(&mut self, Finished { generation, result }: Finished) {
        if self.phase != (Phase::Loading { generation }) {
            debug!("Dropping result of superseded generation {generation}");
            return;
        }

        self.phase = match result {
            GenerationResult::Success { url } => Phase::Succeeded { url },
            GenerationResult::Failure {
                kind: FailureKind::Validation,
                message,
            } => Phase::Failed { message },
            GenerationResult::Failure { message, .. } => Phase::Failed {
                message: format!("Failed to generate image. Please try again.\n{message}"),
            },
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finished(generation: u64, result: GenerationResult) -> Finished {
        Finished { generation, result }
    }

    fn success(url: &str) -> GenerationResult {
        GenerationResult::Success { url: url.into() }
    }

    #[test]
    fn blank_prompt_fails_without_job() {
        let mut state = ViewState::default();
        state.update(Input::PromptChanged("   ".into()));
        assert_eq!(state.update(Input::Generate), Command::None);
        assert!(matches!(state.phase(), Phase::Failed { .. }));
    }

    #[test]
    fn blank_prompt_while_loading_cancels_running_job() {
        let mut state = ViewState::default();
        state.update(Input::PromptChanged("a red fox".into()));
        state.update(Input::Generate);
        state.update(Input::PromptChanged("   ".into()));

        assert_eq!(state.update(Input::Generate), Command::Cancel);
        assert_eq!(
            state.phase(),
            &Phase::Failed {
                message: "Please enter a prompt.".into()
            }
        );

        state.update(finished(
            1,
            GenerationResult::Failure {
                kind: FailureKind::Cancelled,
                message: "Generation was cancelled".into(),
            },
        ));
        assert_eq!(
            state.phase(),
            &Phase::Failed {
                message: "Please enter a prompt.".into()
            }
        );
    }

    #[test]
    fn generate_starts_job_and_loads() {
        let mut state = ViewState::new(Model::Qwen);
        state.update(Input::PromptChanged("a red fox".into()));
        let cmd = state.update(Input::Generate);

        assert_eq!(
            cmd,
            Command::Generate(GenerateJob {
                generation: 1,
                prompt: "a red fox".into(),
                model: Model::Qwen,
            })
        );
        assert!(state.is_loading());

        state.update(finished(1, success("http://x/img.png")));
        assert_eq!(
            state.phase(),
            &Phase::Succeeded {
                url: "http://x/img.png".into()
            }
        );
    }

    #[test]
    fn stale_results_are_ignored() {
        let mut state = ViewState::default();
        state.update(Input::PromptChanged("first".into()));
        state.update(Input::Generate);
        state.update(Input::PromptChanged("second".into()));
        state.update(Input::Generate);

        state.update(finished(
            1,
            GenerationResult::Failure {
                kind: FailureKind::Cancelled,
                message: "Generation was cancelled".into(),
            },
        ));
        assert_eq!(state.phase(), &Phase::Loading { generation: 2 });

        state.update(finished(2, success("http://x/2.png")));
        assert_eq!(state.phase(), &Phase::Succeeded { url: "http://x/2.png".into() });

        // a late duplicate can't overwrite the terminal state
        state.update(finished(2, success("http://x/other.png")));
        assert_eq!(state.phase(), &Phase::Succeeded { url: "http://x/2.png".into() });
    }

    #[test]
    fn failures_are_human_readable() {
        let mut state = ViewState::default();
        state.update(Input::PromptChanged("x".into()));
        state.update(Input::Generate);
        state.update(finished(
            1,
            GenerationResult::Failure {
                kind: FailureKind::UpstreamHttp,
                message: "Upstream error (429 Too Many Requests): slow down".into(),
            },
        ));
        let Phase::Failed { message } = state.phase() else {
            panic!("expected failure");
        };
        assert!(message.starts_with("Failed to generate image. Please try again."));
    }

    #[test]
    fn dropdown_closes_on_selection() {
        let mut state = ViewState::default();
        state.update(Input::ToggleDropdown);
        assert!(state.dropdown_open());
        state.update(Input::SelectModel(Model::Gemini2));
        assert!(!state.dropdown_open());
        assert_eq!(state.model(), Model::Gemini2);

        state.update(Input::ToggleDropdown);
        state.update(Input::CloseDropdown);
        assert!(!state.dropdown_open());
    }
}
