use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use mimic_engine::config::{EngineConfig, GameMode};
use mimic_engine::events::{EventSink, GameEvent};
use mimic_engine::generator::HttpGenerator;
use mimic_engine::session::GameSession;
use mimic_engine::state_machine::RoundPhase;

/// Pretend to be an AI in a group chat full of them.
#[derive(Parser)]
#[command(name = "mimic", version)]
struct Cli {
    /// Open-mic mode: several questions per round, answer deadline enforced.
    #[arg(long)]
    open_mic: bool,
    /// Fixed rng seed for a reproducible session.
    #[arg(long)]
    seed: Option<u64>,
    /// Debug: skipping a round costs no suspicion.
    #[arg(long)]
    no_skip_penalty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = EngineConfig::from_env().context("engine configuration")?;
    if cli.open_mic {
        config.mode = GameMode::open_mic();
    }
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    if cli.no_skip_penalty {
        config.skip_penalized = false;
    }

    info!(url = %config.endpoint.url, model = %config.endpoint.model, "generator endpoint");

    let generator = HttpGenerator::new(config.endpoint.clone(), config.request_timeout);
    let (sink, mut events) = EventSink::channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_event(&event);
        }
    });

    let mode = config.mode;
    let mut session = GameSession::new(config, generator, sink);
    session.start_game().await?;

    println!("你混进了一个 AI 群聊。装下去。(/skip 跳过本轮，/quit 退出)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match session.phase() {
            RoundPhase::GameOver => break,
            RoundPhase::AwaitingPlayerAnswer => {}
            phase => {
                // The driver only ever resumes at a suspension point.
                anyhow::bail!("session suspended in unexpected phase {phase}");
            }
        }

        let line = match mode {
            GameMode::OpenMic {
                answer_deadline, ..
            } => match tokio::time::timeout(answer_deadline, lines.next_line()).await {
                Ok(read) => read?,
                Err(_) => {
                    session.report_answer_timeout().await?;
                    continue;
                }
            },
            GameMode::Challenge => lines.next_line().await?,
        };

        let Some(line) = line else {
            session.end_game("input closed")?;
            break;
        };
        match line.trim() {
            "" => continue,
            "/quit" => {
                session.end_game("player quit")?;
                break;
            }
            "/skip" => session.skip_round().await?,
            answer => session.submit_player_answer(answer).await?,
        }
    }

    drop(session);
    let _ = printer.await;
    Ok(())
}

fn print_event(event: &GameEvent) {
    match event {
        GameEvent::RoundAdvanced {
            round,
            theme_id,
            difficulty,
        } => println!("\n—— 第 {round} 轮 · {theme_id} (难度 {difficulty}/5) ——"),
        GameEvent::AgentSpoke { agent, text, .. } => println!("[{agent}] {text}"),
        GameEvent::ThemeTransitionStage { agent, text, .. } => println!("[{agent}] {text}"),
        GameEvent::QuestionPosed { agent, text, .. } => {
            println!("[{agent}] → 你: {text}");
            println!("(轮到你了)");
        }
        GameEvent::AnswerJudged {
            verdict,
            suspicion_delta,
            suspicion_after,
            ..
        } => {
            if let Some(v) = verdict {
                let outcome = if v.passed { "过关" } else { "露馅" };
                println!(
                    "{outcome} · 得分 {} / 线 {} · {}",
                    v.total_score, v.pass_threshold, v.reason
                );
            }
            println!("怀疑度 {suspicion_after:.0}/100 ({suspicion_delta:+.0})");
        }
        GameEvent::GameOver {
            final_round,
            final_suspicion,
            reason,
        } => println!("\n游戏结束：{reason}（第 {final_round} 轮，怀疑度 {final_suspicion:.0}）"),
    }
}
