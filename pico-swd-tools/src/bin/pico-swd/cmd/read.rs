use anyhow::Context;
use pico_swd::{Host, Session};

use crate::util::{attached, parse_u32};

/// Read words from target memory
///
/// e.g. pico-swd read 0x20000000 4
///      Reads 4 32-bit words starting at 0x20000000
///
/// Output is one line per word: the address followed by the value.
#[derive(clap::Parser)]
#[clap(verbatim_doc_comment)]
pub struct Cmd {
    /// Word aligned address to start reading at
    #[clap(value_parser = parse_u32)]
    address: u32,

    /// Number of words to read
    #[clap(default_value_t = 1)]
    words: u32,
}

impl Cmd {
    pub fn run<H: Host>(self, session: &mut Session<H>) -> anyhow::Result<()> {
        let values = attached(session, |session| self.read(session))?;

        for (address, value) in values {
            println!("{address:08x}: {value:08x}");
        }
        Ok(())
    }

    fn read<H: Host>(&self, session: &mut Session<H>) -> anyhow::Result<Vec<(u32, u32)>> {
        (0..self.words)
            .map(|i| {
                let address = self
                    .address
                    .checked_add(i * 4)
                    .context("Read runs past the end of the address space")?;
                let value = session
                    .read_word(address)
                    .with_context(|| format!("Failed to read {address:#010x}"))?;
                Ok((address, value))
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pico_swd::test::MockTarget;
    use pico_swd::{LinkConfig, Target};
    use pretty_assertions::assert_eq;

    #[test]
    fn reads_consecutive_words() {
        let config = LinkConfig::new(24, 25);
        let mut mock = MockTarget::new(&Target::rp2040(), &config);
        mock.poke(0x2000_0000, 0x1111_1111);
        mock.poke(0x2000_0004, 0x2222_2222);
        let mut session = Session::new(mock, config, Target::rp2040()).unwrap();
        session.begin().unwrap();

        let cmd = Cmd {
            address: 0x2000_0000,
            words: 2,
        };
        let values = cmd.read(&mut session).unwrap();

        assert_eq!(
            values,
            vec![(0x2000_0000, 0x1111_1111), (0x2000_0004, 0x2222_2222)]
        );
    }
}
