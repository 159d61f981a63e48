use winnow::{
    ascii::{alpha1, dec_uint, float, space0, space1},
    combinator::{delimited, dispatch, empty, fail, preceded},
    prelude::*,
};

/// One line of operator input. The grammar only enforces typing; the
/// domain (positivity, index range) is checked by the command
/// constructors afterwards.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Scan,
    Center,
    Rect { x_count: u32, y_count: u32 },
    RectManual { total_scans: u32, step_mm: f64 },
    Circle { index: u32, step_mm: f64, total_points: u32 },
    CircleAuto { index: u32 },
    Step(f64),
    Jog,
    Help,
    Quit,
}

pub fn parse_input(input: &mut &str) -> PResult<Input> {
    delimited(
        space0,
        dispatch! {alpha1;
            "scan" => empty.map(|_| Input::Scan),
            "center" => empty.map(|_| Input::Center),
            "rect" => (preceded(space1, dec_uint), preceded(space1, dec_uint))
                .map(|(x_count, y_count)| Input::Rect { x_count, y_count }),
            "rectman" => (preceded(space1, dec_uint), preceded(space1, float))
                .map(|(total_scans, step_mm)| Input::RectManual { total_scans, step_mm }),
            "circle" => (
                preceded(space1, dec_uint),
                preceded(space1, float),
                preceded(space1, dec_uint),
            )
                .map(|(index, step_mm, total_points)| Input::Circle {
                    index,
                    step_mm,
                    total_points,
                }),
            "circleauto" => preceded(space1, dec_uint).map(|index| Input::CircleAuto { index }),
            "step" => preceded(space1, float).map(Input::Step),
            "jog" => empty.map(|_| Input::Jog),
            "help" => empty.map(|_| Input::Help),
            "quit" | "exit" => empty.map(|_| Input::Quit),
            _ => fail
        },
        space0,
    )
    .parse_next(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scan_requests() {
        assert_eq!(
            parse_input.parse("rect 5 5").unwrap(),
            Input::Rect {
                x_count: 5,
                y_count: 5
            }
        );
        assert_eq!(
            parse_input.parse("rectman 20 0.2").unwrap(),
            Input::RectManual {
                total_scans: 20,
                step_mm: 0.2
            }
        );
        assert_eq!(
            parse_input.parse("circle 2 0.3 40").unwrap(),
            Input::Circle {
                index: 2,
                step_mm: 0.3,
                total_points: 40
            }
        );
        assert_eq!(
            parse_input.parse("circleauto 1").unwrap(),
            Input::CircleAuto { index: 1 }
        );
    }

    #[test]
    fn parses_bare_words() {
        assert_eq!(parse_input.parse("scan").unwrap(), Input::Scan);
        assert_eq!(parse_input.parse("center").unwrap(), Input::Center);
        assert_eq!(parse_input.parse("jog").unwrap(), Input::Jog);
        assert_eq!(parse_input.parse("quit").unwrap(), Input::Quit);
        assert_eq!(parse_input.parse("exit").unwrap(), Input::Quit);
        assert_eq!(parse_input.parse("  help  ").unwrap(), Input::Help);
    }

    #[test]
    fn step_accepts_any_numeric_value() {
        // the domain check happens later, typing is all the grammar does
        assert_eq!(parse_input.parse("step 0.25").unwrap(), Input::Step(0.25));
        assert_eq!(parse_input.parse("step -1").unwrap(), Input::Step(-1.0));
    }

    #[test]
    fn rejects_unknown_or_incomplete_commands() {
        assert!(parse_input.parse("bogus").is_err());
        assert!(parse_input.parse("rect 5").is_err());
        assert!(parse_input.parse("circle 2 0.3").is_err());
        assert!(parse_input.parse("rect five five").is_err());
    }
}
