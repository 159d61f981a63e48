use core::fmt;

use bytes::Bytes;
use winnow::{
    ascii::{dec_uint, float, line_ending},
    combinator::{alt, opt, preceded, terminated},
    prelude::*,
};

use crate::command::{Command, Direction};

/// The exact wire text of the command, without the line terminator.
/// Fields are comma-separated, numbers plain decimal.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::ManualJog { direction, step_mm } => {
                write!(f, "MANUAL,{},{}", direction.token(), step_mm)
            }
            Command::ManualStop => f.write_str("MANUAL,STOP"),
            Command::ManualSetCenter => f.write_str("MANUAL,CENTER"),
            Command::ManualScan => f.write_str("MANUAL,SCAN"),
            Command::RectNxN {
                x_count,
                y_count,
                step_mm,
            } => write!(f, "RECT_NXN,{x_count},{y_count},{step_mm}"),
            Command::RectManual {
                total_scans,
                step_mm,
            } => write!(f, "RECT_MANUAL,{total_scans},{step_mm}"),
            Command::Circle {
                index,
                step_mm,
                total_points,
            } => write!(f, "CIRCLE,{index},{step_mm},{total_points}"),
        }
    }
}

/// Frame a command as one newline-terminated wire line.
pub fn encode(command: &Command) -> Bytes {
    let mut line = command.to_string();
    line.push('\n');
    Bytes::from(line.into_bytes())
}

fn direction(input: &mut &str) -> PResult<Direction> {
    alt((
        'W'.value(Direction::Forward),
        'A'.value(Direction::Left),
        'S'.value(Direction::Backward),
        'D'.value(Direction::Right),
    ))
    .parse_next(input)
}

fn manual(input: &mut &str) -> PResult<Command> {
    alt((
        "STOP".value(Command::ManualStop),
        "CENTER".value(Command::ManualSetCenter),
        "SCAN".value(Command::ManualScan),
        (direction, preceded(',', float))
            .map(|(direction, step_mm)| Command::ManualJog { direction, step_mm }),
    ))
    .parse_next(input)
}

fn rect_nxn(input: &mut &str) -> PResult<Command> {
    (dec_uint, preceded(',', dec_uint), preceded(',', float))
        .map(|(x_count, y_count, step_mm)| Command::RectNxN {
            x_count,
            y_count,
            step_mm,
        })
        .parse_next(input)
}

fn rect_manual(input: &mut &str) -> PResult<Command> {
    (dec_uint, preceded(',', float))
        .map(|(total_scans, step_mm)| Command::RectManual {
            total_scans,
            step_mm,
        })
        .parse_next(input)
}

fn circle(input: &mut &str) -> PResult<Command> {
    (dec_uint, preceded(',', float), preceded(',', dec_uint))
        .map(|(index, step_mm, total_points)| Command::Circle {
            index,
            step_mm,
            total_points,
        })
        .parse_next(input)
}

/// Wire-line decoder, the encoder's inverse. The controller is the real
/// consumer of this grammar; the host-side decoder exists for diagnostics
/// and round-trip checks.
pub fn command(input: &mut &str) -> PResult<Command> {
    terminated(
        alt((
            preceded("MANUAL,", manual),
            preceded("RECT_NXN,", rect_nxn),
            preceded("RECT_MANUAL,", rect_manual),
            preceded("CIRCLE,", circle),
        )),
        opt(line_ending),
    )
    .parse_next(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_exact_wire_text() {
        let cases = [
            (
                Command::manual_jog(Direction::Forward, 0.5).unwrap(),
                "MANUAL,W,0.5",
            ),
            (Command::ManualStop, "MANUAL,STOP"),
            (Command::ManualSetCenter, "MANUAL,CENTER"),
            (Command::ManualScan, "MANUAL,SCAN"),
            (Command::rect_nxn(5, 5), "RECT_NXN,5,5,0.2"),
            (
                Command::rect_manual(20, 0.2).unwrap(),
                "RECT_MANUAL,20,0.2",
            ),
            (
                Command::circle(2, 0.3, 40).unwrap(),
                "CIRCLE,2,0.3,40",
            ),
            (Command::circle_auto(1).unwrap(), "CIRCLE,1,0.2,30"),
        ];
        for (command, wire) in cases {
            assert_eq!(command.to_string(), wire);
            assert_eq!(&encode(&command)[..], format!("{wire}\n").as_bytes());
        }
    }

    #[test]
    fn decode_inverts_encode() {
        let commands = [
            Command::manual_jog(Direction::Right, 1.25).unwrap(),
            Command::ManualStop,
            Command::ManualSetCenter,
            Command::ManualScan,
            Command::rect_nxn(3, 7),
            Command::rect_manual(12, 0.35).unwrap(),
            Command::circle(0, 0.2, 30).unwrap(),
        ];
        for original in commands {
            let line = String::from_utf8(encode(&original).to_vec()).unwrap();
            let decoded = command.parse(&line).unwrap();
            assert_eq!(decoded, original);
        }
    }

    #[test]
    fn rejects_unknown_lines() {
        assert!(command.parse("HOME,1\n").is_err());
        assert!(command.parse("MANUAL,X,0.5\n").is_err());
        assert!(command.parse("RECT_NXN,5\n").is_err());
    }
}
