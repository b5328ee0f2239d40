use anyhow::Context;
use pico_swd::{Host, Session};

/// Reset the target and let it boot
///
/// Uses the reset line when one is configured, which also works on targets
/// that do not respond on SWD. Otherwise the core is asked to reset itself.
#[derive(clap::Parser)]
#[clap(verbatim_doc_comment)]
pub struct Cmd {}

impl Cmd {
    pub fn run<H: Host>(self, session: &mut Session<H>) -> anyhow::Result<()> {
        if session.config().reset.is_none() {
            session
                .begin()
                .with_context(|| format!("Failed to connect to {}", session.target().name))?;
        }

        let result = session.reset_target().context("Failed to reset the target");
        session.end();
        result
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pico_swd::test::MockTarget;
    use pico_swd::{LinkConfig, Target};

    #[test]
    fn reset_through_pin_does_not_connect() {
        let config = LinkConfig::new(24, 25).with_reset(23);
        let mock = MockTarget::new(&Target::rp2040(), &config);
        let mut session = Session::new(mock, config, Target::rp2040()).unwrap();

        Cmd {}.run(&mut session).unwrap();

        assert_eq!(session.host().hardware_resets, 1);
        assert_eq!(session.host().wakes, 0);
    }

    #[test]
    fn reset_without_pin_connects_first() {
        let config = LinkConfig::new(24, 25);
        let mock = MockTarget::new(&Target::rp2040(), &config);
        let mut session = Session::new(mock, config, Target::rp2040()).unwrap();

        Cmd {}.run(&mut session).unwrap();

        assert_eq!(session.host().reset_requests, 1);
        assert!(!session.is_connected());
    }
}
