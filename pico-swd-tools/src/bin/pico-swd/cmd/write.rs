use anyhow::Context;
use pico_swd::{Host, Session};

use crate::util::{attached, parse_u32};

/// Write words to target memory
///
/// e.g. pico-swd write 0x20000000 0xDEADBEEF 0xCAFEF00D
///      Writes 0xDEADBEEF to 0x20000000 and 0xCAFEF00D to 0x20000004
///
/// NOTE: Only RAM and peripheral registers can be written, flash is read-only over SWD.
#[derive(clap::Parser)]
#[clap(verbatim_doc_comment)]
pub struct Cmd {
    /// Word aligned address of the first value
    #[clap(value_parser = parse_u32)]
    address: u32,

    /// Values to write, in decimal (16), hexadecimal (0x10) or octal (0o20) format
    #[clap(value_parser = parse_u32, required = true)]
    values: Vec<u32>,
}

impl Cmd {
    pub fn run<H: Host>(self, session: &mut Session<H>) -> anyhow::Result<()> {
        attached(session, |session| {
            let mut address = self.address;
            for value in &self.values {
                session
                    .write_word(address, *value)
                    .with_context(|| format!("Failed to write {address:#010x}"))?;
                address = address.wrapping_add(4);
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pico_swd::test::MockTarget;
    use pico_swd::{LinkConfig, Target};
    use pretty_assertions::assert_eq;

    #[test]
    fn writes_consecutive_words() {
        let config = LinkConfig::new(24, 25);
        let mock = MockTarget::new(&Target::rp2040(), &config);
        let mut session = Session::new(mock, config, Target::rp2040()).unwrap();

        let cmd = Cmd {
            address: 0x2000_0010,
            values: vec![0xDEAD_BEEF, 0xCAFE_F00D],
        };
        cmd.run(&mut session).unwrap();

        assert_eq!(session.host().peek(0x2000_0010), 0xDEAD_BEEF);
        assert_eq!(session.host().peek(0x2000_0014), 0xCAFE_F00D);
        assert!(!session.is_connected());
    }
}
