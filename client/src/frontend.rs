use std::fmt::Write as _;

use color_eyre::{
    Result,
    eyre::{bail, eyre},
};
use engine::{HttpGateway, Model, ResilientInvoker, invoker::CallOptions};
use strum::IntoEnumIterator;
use tokio::{
    io::{AsyncBufReadExt, BufReader, stdin},
    sync::mpsc,
};

use crate::{
    config::ClientConfig,
    message::{Input, Message},
    session::Session,
    state::{Command, Phase, ViewState},
};

const HELP: &str = indoc::indoc! {"
    Type a prompt and press enter to generate an image.
      /models        show or hide the model list
      /model <id>    pick a model
      /quit          leave
"};

#[derive(Debug, PartialEq)]
enum LineAction {
    Nothing,
    Quit,
    Help,
    Inputs(Vec<Input>),
    Invalid(String),
}

fn parse_line(line: &str) -> LineAction {
    let line = line.trim();
    let mut words = line.split_whitespace();
    match words.next() {
        None => LineAction::Nothing,
        Some("/quit" | "/exit") => LineAction::Quit,
        Some("/help") => LineAction::Help,
        Some("/models") => LineAction::Inputs(vec![Input::ToggleDropdown]),
        Some("/model") => match words.next().map(Model::parse) {
            Some(Ok(model)) => LineAction::Inputs(vec![Input::SelectModel(model)]),
            Some(Err(e)) => LineAction::Invalid(e.to_string()),
            None => LineAction::Invalid("Usage: /model <id>".into()),
        },
        Some(cmd) if cmd.starts_with('/') => LineAction::Invalid(format!("Unknown command {cmd}")),
        Some(_) => LineAction::Inputs(vec![
            Input::CloseDropdown,
            Input::PromptChanged(line.to_string()),
            Input::Generate,
        ]),
    }
}

pub fn render(state: &ViewState) -> String {
    let mut out = String::new();
    if state.dropdown_open() {
        for model in Model::iter() {
            let marker = if model == state.model() { '*' } else { ' ' };
            _ = writeln!(out, " {marker} {model}");
        }
    }

    match state.phase() {
        Phase::Idle => {}
        Phase::Loading { .. } => {
            _ = write!(out, "Generating with {}...", state.model());
        }
        Phase::Succeeded { url } => {
            _ = write!(out, "Image ready: {url}");
        }
        Phase::Failed { message } => {
            _ = write!(out, "Error: {message}");
        }
    }
    out
}

fn session(cfg: &ClientConfig) -> (Session<HttpGateway>, mpsc::UnboundedReceiver<Message>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let invoker = ResilientInvoker::new(HttpGateway::new(&cfg.gateway_url), cfg.retry_policy());
    (Session::new(invoker, CallOptions::default(), tx), rx)
}

/// Generates one image, printing the URL on success.
pub async fn run_once(cfg: &ClientConfig, prompt: String) -> Result<()> {
    let (mut session, mut rx) = session(cfg);
    let mut state = ViewState::new(cfg.default_model);

    state.update(Input::PromptChanged(prompt));
    if let Command::Generate(job) = state.update(Input::Generate) {
        eprintln!("{}", render(&state));
        session.start(job);
    }

    while state.is_loading() {
        tokio::select! {
            msg = rx.recv() => {
                let msg = msg.ok_or(eyre!("Generation task vanished"))?;
                state.update(msg);
            }
            _ = tokio::signal::ctrl_c() => {
                session.cancel();
                bail!("Interrupted");
            }
        }
    }

    match state.phase() {
        Phase::Succeeded { url } => {
            println!("{url}");
            Ok(())
        }
        Phase::Failed { message } => bail!("{message}"),
        other => bail!("Unexpected state: {other:?}"),
    }
}

pub async fn run_interactive(cfg: &ClientConfig) -> Result<()> {
    let (mut session, mut rx) = session(cfg);
    let mut state = ViewState::new(cfg.default_model);
    let mut lines = BufReader::new(stdin()).lines();
    println!("{HELP}");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_line(&line) {
                    LineAction::Nothing => continue,
                    LineAction::Quit => break,
                    LineAction::Help => println!("{HELP}"),
                    LineAction::Invalid(msg) => println!("{msg}"),
                    LineAction::Inputs(inputs) => {
                        for input in inputs {
                            session.dispatch(state.update(input));
                        }
                        println!("{}", render(&state));
                    }
                }
            }
            Some(msg) = rx.recv() => {
                let before = state.phase().clone();
                state.update(msg);
                if *state.phase() != before {
                    println!("{}", render(&state));
                }
            }
        }
    }

    session.cancel();
    Ok(())
}
