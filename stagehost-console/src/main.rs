use std::io::stdout;

use anyhow::{bail, Context};
use crossterm::{
    event::{
        Event as TermEvent, EventStream, KeyCode, KeyEventKind, KeyboardEnhancementFlags,
        PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
    },
    execute,
    style::Stylize,
    terminal::supports_keyboard_enhancement,
};
use futures_util::{AsyncWriteExt, StreamExt};
use rustyline_async::{Readline, ReadlineEvent, SharedWriter};
use tokio::sync::{broadcast, mpsc};
use winnow::Parser;

use stagehost_commands::{
    input::{parse_input, Input},
    jog::DEFAULT_STEP_MM,
    Command, Direction, Event as SessionEvent, LogEntry, Mode, Request, Session, Severity,
};
use stagehost_core::Stage;

/// Interactive console for a serial-attached scan stage controller.
#[derive(clap::Parser)]
#[command(version, about)]
struct Args {
    /// Serial port of the stage controller; autodetected when exactly one
    /// port exists.
    port: Option<String>,

    /// Baud rate of the controller link.
    #[arg(long, default_value_t = 9600)]
    baud: u32,
}

static HELP: &str = "\
Commands:
  scan                           scan at the current position
  center                         set the scan center at the current position
  rect <x> <y>                   rectangle scan, x by y points on the fixed grid
  rectman <total> <step>         rectangle scan, step size in mm
  circle <index> <step> <points> circle scan from preset 0-3
  circleauto <index>             circle scan from preset 0-3, fixed step and count
  step <mm>                      set the manual jog step size
  jog                            drive the stage with W/A/S/D
  help                           show this message
  quit                           exit
";

fn pick_port(args: &Args) -> anyhow::Result<String> {
    if let Some(port) = &args.port {
        return Ok(port.clone());
    }
    let ports = tokio_serial::available_ports().context("could not enumerate serial ports")?;
    match ports.as_slice() {
        [] => bail!("no serial ports found, connect the stage controller and retry"),
        [only] => Ok(only.port_name.clone()),
        many => {
            let names: Vec<&str> = many.iter().map(|port| port.port_name.as_str()).collect();
            bail!(
                "several serial ports found ({}), pass one explicitly",
                names.join(", ")
            )
        }
    }
}

/// True while the session is alive; a closed channel means it ended and
/// the REPL should wind down and report why.
async fn forward(requests: &mpsc::Sender<Request>, request: Request) -> bool {
    requests.send(request).await.is_ok()
}

async fn print_events(mut events: broadcast::Receiver<SessionEvent>, mut writer: SharedWriter) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        };
        let line = match event {
            SessionEvent::Log(LogEntry { severity, text }) => match severity {
                Severity::Success => format!("{}\n", text.as_ref().green()),
                Severity::Warning => format!("{}\n", text.as_ref().red()),
                Severity::Neutral => format!("{text}\n"),
            },
            SessionEvent::Status { state, text } => format!("[{state}] {text}\n"),
            SessionEvent::Notice(text) => format!("{}\n", text.as_ref().yellow()),
        };
        if writer.write_all(line.as_bytes()).await.is_err() {
            break;
        }
    }
}

async fn jog_keys(
    requests: &mpsc::Sender<Request>,
    step_mm: f64,
    hold_to_move: bool,
) -> anyhow::Result<()> {
    let mut events = EventStream::new();
    while let Some(event) = events.next().await.transpose()? {
        let TermEvent::Key(key) = event else { continue };
        if matches!(key.code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q'))
            && key.kind == KeyEventKind::Press
        {
            break;
        }
        let KeyCode::Char(token) = key.code else { continue };
        let Some(direction) = Direction::from_token(token) else {
            continue;
        };
        let request = match key.kind {
            KeyEventKind::Press if hold_to_move => Request::Press(direction),
            KeyEventKind::Release => Request::Release(direction),
            // without release reporting each press is a single step; the
            // step size was already domain-checked when it was set
            KeyEventKind::Press => match Command::manual_jog(direction, step_mm) {
                Ok(command) => Request::Submit(command),
                Err(_) => continue,
            },
            // held-key repeats are the session's business, not ours
            _ => continue,
        };
        if !forward(requests, request).await {
            break;
        }
    }
    Ok(())
}

async fn jog_mode(
    requests: &mpsc::Sender<Request>,
    writer: &mut SharedWriter,
    step_mm: f64,
) -> anyhow::Result<()> {
    if !forward(requests, Request::SetMode(Mode::Manual)).await {
        return Ok(());
    }
    let hold_to_move = supports_keyboard_enhancement().unwrap_or(false);
    let banner = if hold_to_move {
        "jog: hold W/A/S/D to move, Esc to leave\n"
    } else {
        "jog: W/A/S/D steps the stage once per press, Esc to leave\n"
    };
    writer.write_all(banner.as_bytes()).await?;

    // the line editor already holds the terminal in raw mode
    if hold_to_move {
        execute!(
            stdout(),
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        )?;
    }
    let result = jog_keys(requests, step_mm, hold_to_move).await;
    if hold_to_move {
        let _ = execute!(stdout(), PopKeyboardEnhancementFlags);
    }
    // a release the terminal never delivered must not leave a key held
    for direction in Direction::ALL {
        if !forward(requests, Request::Release(direction)).await {
            break;
        }
    }
    result
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = <Args as clap::Parser>::parse();
    let port_name = pick_port(&args)?;
    let stage = Stage::open(&port_name, args.baud)
        .with_context(|| format!("could not open {port_name}"))?;
    tracing::info!("opened {port_name} at {} baud", args.baud);

    let session = Session::new(stage);
    let events = session.subscribe();
    let (requests, request_rx) = mpsc::channel(8);
    let session_task = tokio::spawn(session.run(request_rx));

    let (mut readline, mut writer) = Readline::new(format!("{port_name}> "))?;
    let printer = tokio::spawn(print_events(events, writer.clone()));
    writer
        .write_all(format!("connected to {port_name}, `help` lists the commands\n").as_bytes())
        .await?;

    let mut step_mm = DEFAULT_STEP_MM;
    'repl: loop {
        match readline.readline().await {
            Ok(ReadlineEvent::Line(line)) => {
                let line = line.trim().to_owned();
                if line.is_empty() {
                    continue;
                }
                readline.add_history_entry(line.clone());
                let parsed = match parse_input.parse(&line) {
                    Ok(parsed) => parsed,
                    Err(_) => {
                        writer
                            .write_all(b"invalid command, `help` lists the commands\n")
                            .await?;
                        continue;
                    }
                };
                let mut outbox = Vec::new();
                match parsed {
                    Input::Help => {
                        writer.write_all(HELP.as_bytes()).await?;
                    }
                    Input::Quit => break,
                    Input::Jog => {
                        jog_mode(&requests, &mut writer, step_mm).await?;
                    }
                    Input::Scan => {
                        outbox.push(Request::SetMode(Mode::Manual));
                        outbox.push(Request::Submit(Command::ManualScan));
                    }
                    Input::Center => {
                        outbox.push(Request::SetMode(Mode::Manual));
                        outbox.push(Request::Submit(Command::ManualSetCenter));
                    }
                    Input::Rect { x_count, y_count } => {
                        outbox.push(Request::SetMode(Mode::RectNxn));
                        outbox.push(Request::Submit(Command::rect_nxn(x_count, y_count)));
                    }
                    Input::RectManual {
                        total_scans,
                        step_mm,
                    } => match Command::rect_manual(total_scans, step_mm) {
                        Ok(command) => {
                            outbox.push(Request::SetMode(Mode::RectManual));
                            outbox.push(Request::Submit(command));
                        }
                        Err(err) => {
                            writer
                                .write_all(format!("{}\n", err.to_string().yellow()).as_bytes())
                                .await?;
                        }
                    },
                    Input::Circle {
                        index,
                        step_mm,
                        total_points,
                    } => match Command::circle(index, step_mm, total_points) {
                        Ok(command) => {
                            outbox.push(Request::SetMode(Mode::CircleUser));
                            outbox.push(Request::Submit(command));
                        }
                        Err(err) => {
                            writer
                                .write_all(format!("{}\n", err.to_string().yellow()).as_bytes())
                                .await?;
                        }
                    },
                    Input::CircleAuto { index } => match Command::circle_auto(index) {
                        Ok(command) => {
                            outbox.push(Request::SetMode(Mode::CircleAuto));
                            outbox.push(Request::Submit(command));
                        }
                        Err(err) => {
                            writer
                                .write_all(format!("{}\n", err.to_string().yellow()).as_bytes())
                                .await?;
                        }
                    },
                    Input::Step(value) => {
                        step_mm = value;
                        outbox.push(Request::SetJogStep(value));
                    }
                }
                for request in outbox {
                    if !forward(&requests, request).await {
                        break 'repl;
                    }
                }
            }
            Ok(ReadlineEvent::Eof) | Ok(ReadlineEvent::Interrupted) => break,
            Err(err) => return Err(err).context("could not read input"),
        }
    }

    drop(requests);
    let result = match session_task.await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(err).context("stage connection failed"),
        Err(err) => Err(err).context("session task failed"),
    };
    let _ = printer.await;
    result
}
