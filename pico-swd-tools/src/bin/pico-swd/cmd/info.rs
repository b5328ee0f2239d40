use pico_swd::dp::Dpidr;
use pico_swd::rom::{
    self, CONNECT_INTERNAL_FLASH, DEBUG_TRAMPOLINE_END, FLASH_EXIT_XIP, FLASH_FLUSH_CACHE,
    FLASH_RANGE_ERASE, FLASH_RANGE_PROGRAM,
};
use pico_swd::{Host, Session};

use crate::util::attached;

const ROUTINES: [(u16, &str); 6] = [
    (CONNECT_INTERNAL_FLASH, "connect internal flash"),
    (FLASH_EXIT_XIP, "exit XIP"),
    (FLASH_RANGE_ERASE, "range erase"),
    (FLASH_RANGE_PROGRAM, "range program"),
    (FLASH_FLUSH_CACHE, "flush cache"),
    (DEBUG_TRAMPOLINE_END, "debug trampoline end"),
];

#[derive(clap::Parser)]
pub struct Cmd {}

impl Cmd {
    pub fn run<H: Host>(self, session: &mut Session<H>) -> anyhow::Result<()> {
        attached(session, |session| {
            println!("{}", describe(session)?.join("\n"));
            Ok(())
        })
    }
}

fn describe<H: Host>(session: &mut Session<H>) -> anyhow::Result<Vec<String>> {
    let mut lines = vec![format!("Target: {}", session.target().name)];

    if let Some(idcode) = session.idcode() {
        let dpidr = Dpidr::from(idcode);
        lines.push(format!(
            "IDCODE: {:#010x} (designer {:#05x}, part {:#04x}, DPv{}, revision {})",
            idcode,
            dpidr.designer(),
            dpidr.part_no(),
            dpidr.version(),
            dpidr.revision()
        ));
    }

    lines.push("Boot ROM routines:".to_string());
    for (code, description) in ROUTINES {
        let location = match session.find_rom_func(code)? {
            Some(address) => format!("{address:#010x}"),
            None => "missing".to_string(),
        };
        lines.push(format!(
            "  {} {:<22} {}",
            rom::display_code(code),
            description,
            location
        ));
    }

    Ok(lines)
}

#[cfg(test)]
mod test {
    use super::*;
    use pico_swd::test::MockTarget;
    use pico_swd::{LinkConfig, RomTableLayout, Target};
    use pretty_assertions::assert_eq;

    #[test]
    fn describes_rp2040() {
        let config = LinkConfig::new(24, 25);
        let mock = MockTarget::new(&Target::rp2040(), &config).with_rom_table(
            RomTableLayout::Compact,
            &[(FLASH_RANGE_ERASE, 0x421), (FLASH_RANGE_PROGRAM, 0x431)],
        );
        let mut session = Session::new(mock, config, Target::rp2040()).unwrap();
        session.begin().unwrap();

        let lines = describe(&mut session).unwrap();

        assert_eq!(lines[0], "Target: rp2040");
        assert_eq!(
            lines[1],
            "IDCODE: 0x0bc12477 (designer 0x23b, part 0xbc, DPv2, revision 0)"
        );
        assert_eq!(lines[5], format!("  'RE' {:<22} 0x00000421", "range erase"));
        assert_eq!(lines[8], "  'DE' debug trampoline end   missing");
    }
}
