use std::sync::Arc;

use engine::{GenerationError, ImageGateway, ResilientInvoker, invoker::CallOptions};
use log::{error, info};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::{
    message::{Finished, Message},
    state::{Command, GenerateJob},
};

/// Runs generate jobs in the background. Starting a job cancels the one before it.
pub struct Session<G> {
    invoker: Arc<ResilientInvoker<G>>,
    options: CallOptions,
    tx: UnboundedSender<Message>,
    current: Option<CancellationToken>,
}

impl<G> Session<G>
where
    G: ImageGateway + Send + Sync + 'static,
{
    pub fn new(
        invoker: ResilientInvoker<G>,
        options: CallOptions,
        tx: UnboundedSender<Message>,
    ) -> Self {
        Self {
            invoker: Arc::new(invoker),
            options,
            tx,
            current: None,
        }
    }

    pub fn start(&mut self, job: GenerateJob) {
        if let Some(previous) = self.current.take() {
            info!("Superseding running generation");
            previous.cancel();
        }

        let cancel = CancellationToken::new();
        self.current = Some(cancel.clone());

        let GenerateJob {
            generation,
            prompt,
            model,
        } = job;
        let invoker = self.invoker.clone();
        let options = self.options;
        let work = tokio::spawn(async move {
            invoker
                .generate_traced(&prompt, model, options, &cancel)
                .await
                .result
        });

        // every job reports exactly one Finished, even if it panicked
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = match work.await {
                Ok(result) => result,
                Err(e) => {
                    error!("Generation {generation} aborted: {e}");
                    GenerationError::Internal {
                        message: e.to_string(),
                    }
                    .into()
                }
            };
            _ = tx.send(Finished { generation, result }.into());
        });
    }

    /// Carries out a [`Command`] returned by [`crate::state::ViewState::update`].
    pub fn dispatch(&mut self, command: Command) {
        match command {
            Command::None => {}
            Command::Generate(job) => self.start(job),
            Command::Cancel => self.cancel(),
        }
    }

    pub fn cancel(&mut self) {
        if let Some(token) = self.current.take() {
            token.cancel();
        }
    }
}

impl<G> Drop for Session<G> {
    fn drop(&mut self) {
        if let Some(token) = self.current.take() {
            token.cancel();
        }
    }
}
