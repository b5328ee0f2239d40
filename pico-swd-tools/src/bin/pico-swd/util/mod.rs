pub mod config;
pub mod logging;
pub mod progress;

use std::num::ParseIntError;

use anyhow::Context;
use pico_swd::{Host, Session};

pub fn parse_u32(input: &str) -> Result<u32, ParseIntError> {
    parse_int::parse(input)
}

/// Connect, run `op`, and disconnect again.
///
/// `end` does nothing if `op` already reset the target.
pub fn attached<H: Host, T>(
    session: &mut Session<H>,
    op: impl FnOnce(&mut Session<H>) -> anyhow::Result<T>,
) -> anyhow::Result<T> {
    session
        .begin()
        .with_context(|| format!("Failed to connect to {}", session.target().name))?;

    let result = op(session);
    session.end();
    result
}

#[cfg(test)]
mod test {
    use super::*;
    use pico_swd::test::MockTarget;
    use pico_swd::{LinkConfig, Target};
    use test_case::test_case;

    #[test_case("16" => Ok(16))]
    #[test_case("0x2000_0000" => Ok(0x2000_0000))]
    #[test_case("0o20" => Ok(16))]
    #[test_case("0b101" => Ok(5))]
    fn numbers(input: &str) -> Result<u32, ParseIntError> {
        parse_u32(input)
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_u32("word").is_err());
    }

    #[test]
    fn attached_disconnects_afterwards() {
        let config = LinkConfig::new(24, 25);
        let mock = MockTarget::new(&Target::rp2040(), &config);
        let mut session = Session::new(mock, config, Target::rp2040()).unwrap();

        let idcode = attached(&mut session, |session| Ok(session.idcode())).unwrap();

        assert_eq!(idcode, Some(0x0BC1_2477));
        assert!(!session.is_connected());
    }

    #[test]
    fn attached_disconnects_on_failure() {
        let config = LinkConfig::new(24, 25);
        let mock = MockTarget::new(&Target::rp2040(), &config);
        let mut session = Session::new(mock, config, Target::rp2040()).unwrap();

        let result: anyhow::Result<()> = attached(&mut session, |_| anyhow::bail!("failed"));

        assert!(result.is_err());
        assert!(!session.is_connected());
    }
}
