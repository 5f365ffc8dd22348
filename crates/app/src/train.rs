//! Interactive training session on the terminal.
//!
//! Playback is simulated: the player ticks every 250ms and advances a
//! quarter second per tick for each step of `--speed`, so the watch lockout
//! sees the same progress events a real player would send.

use std::error::Error;
use std::io::Write;
use std::time::Duration;

use chauffeur_core::model::{OptionId, PASS_THRESHOLD_PERCENT, QuestionId};
use chauffeur_core::training::PlaybackEvent;
use dialoguer::{Confirm, Select};
use services::{
    AppServices, FetchStage, FinalizeStatus, SubmissionOutcome, TrainingError, TrainingFlow,
    TrainingState,
};

use crate::cli::TrainArgs;
use crate::commands::require_session;

const TICK: Duration = Duration::from_millis(250);
const STEP_SECS: f64 = 0.25;

type CommandResult = Result<(), Box<dyn Error>>;

pub async fn run(services: &AppServices, args: &TrainArgs) -> CommandResult {
    let user = require_session(services).await?;
    println!("Code of Conduct training for {}", user.full_name());

    let keeper = services.session_keeper().spawn();
    let result = drive(services.training_flow(), args.speed).await;
    keeper.abort();
    result
}

/// Errors that end the session; everything else is already on the flow state.
fn fatal(err: TrainingError) -> CommandResult {
    match &err {
        TrainingError::NotSignedIn => Err(err.into()),
        TrainingError::Api(api) if api.is_session_expired() => Err(err.into()),
        _ => {
            tracing::debug!(error = %err, "training step failed");
            Ok(())
        }
    }
}

fn ask(prompt: &str, default: bool) -> Result<bool, dialoguer::Error> {
    Confirm::new()
        .with_prompt(prompt)
        .default(default)
        .interact()
}

async fn drive(mut flow: TrainingFlow, speed: u32) -> CommandResult {
    if let Err(err) = flow.start().await {
        fatal(err)?;
    }

    loop {
        match flow.state().clone() {
            TrainingState::ShowingVideo(_) => {
                print_progress(&flow);
                watch(&mut flow, speed).await?;
                answer_quiz(&mut flow)?;
                match flow.submit().await {
                    Ok(SubmissionOutcome::Passed { score }) => {
                        println!("Passed with {score:.0}%.");
                    }
                    Ok(SubmissionOutcome::Failed { score }) => {
                        println!(
                            "Scored {score:.0}%, {PASS_THRESHOLD_PERCENT}% is needed. Try the quiz again."
                        );
                    }
                    Err(err) => {
                        println!("Submission failed: {err}");
                        fatal(err)?;
                        if !ask("Try again?", true)? {
                            return Ok(());
                        }
                    }
                }
            }
            TrainingState::Error { stage, message } => {
                let what = match stage {
                    FetchStage::List => "the video list".to_string(),
                    FetchStage::Completions => "your saved progress".to_string(),
                    FetchStage::Detail(id) => format!("video #{id}"),
                };
                println!("Could not load {what}: {message}");
                if !ask("Retry?", true)? {
                    return Ok(());
                }
                if let Err(err) = flow.retry().await {
                    fatal(err)?;
                }
            }
            TrainingState::NoVideos => {
                println!("No training videos are available yet. Check back later.");
                return Ok(());
            }
            TrainingState::AllComplete(FinalizeStatus::Synced) => {
                println!("Training complete. Your exam status is recorded.");
                return Ok(());
            }
            TrainingState::AllComplete(FinalizeStatus::PendingSync { reason }) => {
                println!("Training complete, but it has not been recorded yet ({reason}).");
                println!("An administrator may need to confirm your completion.");
                if !ask("Try recording it again?", true)? {
                    return Ok(());
                }
                if let Err(err) = flow.retry_finalize().await {
                    fatal(err)?;
                }
            }
            TrainingState::LoadingList | TrainingState::Submitting(_) => {
                if let Err(err) = flow.load().await {
                    fatal(err)?;
                }
            }
        }
    }
}

fn print_progress(flow: &TrainingFlow) {
    let (Some(progress), Some(active)) = (flow.progress(), flow.active()) else {
        return;
    };
    println!(
        "\nVideo {} of {}: {}",
        progress.completed + 1,
        progress.total,
        active.video().title
    );
    if let Some(description) = &active.video().description {
        println!("{description}");
    }
    println!("{}", active.video().video_url);
}

async fn watch(flow: &mut TrainingFlow, speed: u32) -> CommandResult {
    let Some(active) = flow.active() else {
        return Ok(());
    };
    if active.lockout().quiz_unlocked() {
        return Ok(());
    }
    let duration = active.video().duration.max(0.0);
    let mut position = active.lockout().position();

    let mut ticker = tokio::time::interval(TICK);
    while position < duration {
        ticker.tick().await;
        for _ in 0..speed {
            position = (position + STEP_SECS).min(duration);
            flow.playback(PlaybackEvent::Progress(position))?;
        }
        print!("\r  watching {position:>6.1}s / {duration:.1}s");
        std::io::stdout().flush()?;
    }
    flow.playback(PlaybackEvent::Ended)?;
    println!("\r  watched {duration:.1}s, quiz unlocked");
    Ok(())
}

fn answer_quiz(flow: &mut TrainingFlow) -> CommandResult {
    let Some(active) = flow.active() else {
        return Ok(());
    };
    let questions: Vec<(QuestionId, String, Vec<(OptionId, String)>)> = active
        .video()
        .ordered_questions()
        .into_iter()
        .map(|q| {
            let options = q.options.iter().map(|o| (o.id, o.text.clone())).collect();
            (q.id, q.text.clone(), options)
        })
        .collect();
    let previous: Vec<Option<OptionId>> = questions
        .iter()
        .map(|(id, _, _)| active.answers().selected(*id))
        .collect();

    for ((question, text, options), previous) in questions.into_iter().zip(previous) {
        let labels: Vec<&str> = options.iter().map(|(_, label)| label.as_str()).collect();
        let default = previous
            .and_then(|chosen| options.iter().position(|(id, _)| *id == chosen))
            .unwrap_or(0);
        let picked = Select::new()
            .with_prompt(text)
            .items(&labels)
            .default(default)
            .interact()?;
        if let Some((option, _)) = options.get(picked) {
            flow.select_answer(question, *option)?;
        }
    }
    Ok(())
}
