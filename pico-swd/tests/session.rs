use pico_swd::swd::PortType;
use pico_swd::test::{Ack, MockTarget, PinEvent, Transaction};
use pico_swd::{ErrorKind, LinkConfig, PinMode, Session, Target};
use pretty_assertions::assert_eq;

const SWDIO: u32 = 2;
const SWCLK: u32 = 3;
const RESET: u32 = 4;
const UART_TX: u32 = 5;

fn session_with(
    target: Target,
    config: LinkConfig,
    setup: impl FnOnce(MockTarget) -> MockTarget,
) -> Session<MockTarget> {
    let mock = setup(MockTarget::new(&target, &config));
    Session::new(mock, config, target).expect("Failed to create session")
}

fn rp2040_session() -> Session<MockTarget> {
    session_with(Target::rp2040(), LinkConfig::new(SWDIO, SWCLK), |mock| mock)
}

#[test]
fn begin_connects_and_reads_idcode() {
    let mut session = rp2040_session();

    session.begin().expect("Failed to connect");

    assert!(session.is_connected());
    assert_eq!(session.idcode(), Some(0x0BC1_2477));
    assert_eq!(session.host().wakes, 1);
    assert!(session.host().is_selected());
    assert_eq!(session.host().contentions, 0);
    assert_eq!(session.last_error(), None);
}

#[test]
fn begin_selects_before_anything_else() {
    let mut session = rp2040_session();

    session.begin().unwrap();

    let transactions = &session.host().transactions;
    assert_eq!(transactions[0], Transaction::TargetSel(0x0100_2927));
    // ABORT comes first after selection, then the IDCODE.
    assert!(matches!(
        transactions[1],
        Transaction::Dp {
            read: false,
            address: 0x0,
            value: 0x1E,
            ..
        }
    ));
    assert!(matches!(
        transactions[2],
        Transaction::Dp {
            read: true,
            address: 0x0,
            value: 0x0BC1_2477,
            ..
        }
    ));
}

#[test]
fn mismatching_idcode_is_tolerated() {
    let mut session = session_with(Target::rp2040(), LinkConfig::new(SWDIO, SWCLK), |mock| {
        mock.with_idcode(0x1BA0_1477)
    });

    session.begin().unwrap();

    assert_eq!(session.idcode(), Some(0x1BA0_1477));
}

#[test]
fn end_when_disconnected_does_nothing() {
    let mut session = rp2040_session();

    session.end();
    session.end();

    assert!(session.host().events.is_empty());
    assert_eq!(session.host().clock_edges, 0);
}

#[test]
fn end_twice_is_idempotent() {
    let mut session = rp2040_session();
    session.begin().unwrap();

    session.end();
    let events = session.host().events.len();
    let edges = session.host().clock_edges;
    session.end();

    assert!(!session.is_connected());
    assert_eq!(session.host().events.len(), events);
    assert_eq!(session.host().clock_edges, edges);
}

#[test]
fn end_powers_down_and_releases_pins() {
    let mut session = rp2040_session();
    session.begin().unwrap();
    session.host_mut().transactions.clear();
    session.host_mut().events.clear();

    session.end();

    assert_eq!(session.host().dp_writes(0x8), vec![0]);
    assert_eq!(session.host().dp_writes(0x4), vec![0]);
    let events = &session.host().events;
    assert_eq!(
        events[events.len() - 2..],
        [
            PinEvent::Mode(SWDIO, PinMode::InputPullUp),
            PinEvent::Mode(SWCLK, PinMode::InputPullUp)
        ]
    );
}

#[test]
fn memory_access_requires_connection() {
    let mut session = rp2040_session();

    let read = session.read_word(0x2000_0000);
    let write = session.write_word(0x2000_0000, 1);

    assert_eq!(read.map_err(|e| e.kind()), Err(ErrorKind::NotConnected));
    assert_eq!(write.map_err(|e| e.kind()), Err(ErrorKind::NotConnected));
    assert_eq!(
        session.last_error().map(|e| e.kind()),
        Some(ErrorKind::NotConnected)
    );
    assert!(session.host().events.is_empty());
    assert_eq!(session.host().clock_edges, 0);
}

#[test]
fn select_is_written_before_every_ap_access() {
    let mut session = rp2040_session();
    session.begin().unwrap();
    session.host_mut().poke(0x2000_0100, 0xDEAD_BEEF);
    session.host_mut().transactions.clear();

    let value = session.read_word(0x2000_0100).unwrap();

    assert_eq!(value, 0xDEAD_BEEF);
    let ap = Target::rp2040().mem_ap;
    assert_eq!(
        session.host().transactions,
        vec![
            Transaction::Dp {
                read: false,
                address: 0x8,
                value: 0x1,
                ack: 0b001
            },
            Transaction::Ap {
                read: false,
                ap,
                address: 0x04,
                value: 0x2000_0100,
                ack: 0b001
            },
            Transaction::Dp {
                read: false,
                address: 0x8,
                value: 0x1,
                ack: 0b001
            },
            Transaction::Ap {
                read: true,
                ap,
                address: 0x0C,
                value: 0xDEAD_BEEF,
                ack: 0b001
            },
            Transaction::Dp {
                read: true,
                address: 0xC,
                value: 0xDEAD_BEEF,
                ack: 0b001
            },
        ]
    );
}

#[test]
fn select_follows_the_register_bank() {
    let mut session = rp2040_session();

    session.begin().unwrap();

    // Connecting sets up CSW in bank 0, then reads IDR from bank 0xF.
    let transactions = &session.host().transactions;
    let csw = transactions
        .iter()
        .position(|t| {
            matches!(
                t,
                Transaction::Ap {
                    read: false,
                    address: 0x00,
                    ..
                }
            )
        })
        .expect("CSW was never written");
    let ap = Target::rp2040().mem_ap;
    let select = |value| Transaction::Dp {
        read: false,
        address: 0x8,
        value,
        ack: 0b001,
    };

    assert_eq!(transactions[csw - 1], select(0x01));
    assert_eq!(
        transactions[csw + 1..csw + 5],
        [
            select(0xF1),
            Transaction::Ap {
                read: true,
                ap,
                address: 0xFC,
                value: 0x0477_0031,
                ack: 0b001
            },
            Transaction::Dp {
                read: true,
                address: 0xC,
                value: 0x0477_0031,
                ack: 0b001
            },
            // The next memory access goes back to bank 0.
            select(0x01),
        ]
    );
}

#[test]
fn write_then_read_back() {
    let mut session = rp2040_session();
    session.begin().unwrap();

    session.write_word(0x2000_0200, 0x1234_5678).unwrap();

    assert_eq!(session.host().peek(0x2000_0200), 0x1234_5678);
    assert_eq!(session.read_word(0x2000_0200).unwrap(), 0x1234_5678);
}

#[test]
fn unaligned_access_is_rejected() {
    let mut session = rp2040_session();
    session.begin().unwrap();

    let result = session.read_word(0x2000_0002);

    assert_eq!(result.map_err(|e| e.kind()), Err(ErrorKind::Alignment));
}

#[test]
fn fault_is_followed_by_exactly_one_abort() {
    let mut session = rp2040_session();
    session.begin().unwrap();
    session.host_mut().transactions.clear();
    session
        .host_mut()
        .inject(PortType::AccessPort, true, 0xC, Ack::Fault);

    let result = session.read_word(0x2000_0000);

    assert_eq!(result.map_err(|e| e.kind()), Err(ErrorKind::Fault));
    assert_eq!(session.host().dp_writes(0x0), vec![0x1E]);
    assert_eq!(session.statistics().fault_responses, 1);
    assert_eq!(
        session.last_error().map(|e| e.kind()),
        Some(ErrorKind::Fault)
    );

    // The sticky error is gone, the next access works.
    session.read_word(0x2000_0000).unwrap();
    assert_eq!(session.host().dp_writes(0x0), vec![0x1E]);
}

#[test]
fn wait_is_reported_without_abort() {
    let mut session = rp2040_session();
    session.begin().unwrap();
    session.host_mut().transactions.clear();
    session
        .host_mut()
        .inject(PortType::AccessPort, false, 0xC, Ack::Wait);

    let result = session.write_word(0x2000_0000, 7);

    assert_eq!(result.map_err(|e| e.kind()), Err(ErrorKind::Wait));
    assert!(session.host().dp_writes(0x0).is_empty());
    assert_eq!(session.statistics().wait_responses, 1);
}

#[test]
fn identification_gives_up_after_three_attempts() {
    let mut wrong = Target::rp2040();
    wrong.targetsel = 0x1100_2927;
    let config = LinkConfig::new(SWDIO, SWCLK);
    let mock = MockTarget::new(&Target::rp2040(), &config);
    let mut session = Session::new(mock, config, wrong).unwrap();

    let result = session.begin();

    assert_eq!(result.map_err(|e| e.kind()), Err(ErrorKind::Timeout));
    assert!(!session.is_connected());
    assert_eq!(session.host().wakes, 3);
    assert_eq!(
        session.last_error().map(|e| e.kind()),
        Some(ErrorKind::Timeout)
    );
    let events = &session.host().events;
    assert_eq!(
        events[events.len() - 2..],
        [
            PinEvent::Mode(SWDIO, PinMode::InputPullUp),
            PinEvent::Mode(SWCLK, PinMode::InputPullUp)
        ]
    );
}

#[test]
fn implausible_idcode_is_retried() {
    let mut session = session_with(Target::rp2040(), LinkConfig::new(SWDIO, SWCLK), |mock| {
        mock.with_idcode(0xFFFF_FFFF)
    });

    let result = session.begin();

    assert_eq!(result.map_err(|e| e.kind()), Err(ErrorKind::Timeout));
    assert_eq!(session.host().wakes, 3);
}

fn ctrl_stat_reads(mock: &MockTarget) -> usize {
    mock.transactions
        .iter()
        .filter(|transaction| {
            matches!(
                transaction,
                Transaction::Dp {
                    read: true,
                    address: 0x4,
                    ..
                }
            )
        })
        .count()
}

#[test]
fn power_up_is_polled_ten_times() {
    let mut session = session_with(Target::rp2040(), LinkConfig::new(SWDIO, SWCLK), |mock| {
        mock.never_power_up()
    });

    let result = session.begin();

    assert_eq!(result.map_err(|e| e.kind()), Err(ErrorKind::Timeout));
    assert_eq!(ctrl_stat_reads(session.host()), 10);
    assert!(!session.is_connected());
}

#[test]
fn slow_power_up_is_waited_for() {
    let mut session = session_with(Target::rp2040(), LinkConfig::new(SWDIO, SWCLK), |mock| {
        mock.power_up_after(4)
    });

    session.begin().unwrap();

    assert_eq!(ctrl_stat_reads(session.host()), 4);
}

#[test]
fn hardware_reset_floats_pins_before_asserting() {
    let config = LinkConfig::new(SWDIO, SWCLK)
        .with_reset(RESET)
        .with_extra_pin(UART_TX);
    let mut session = session_with(Target::rp2040(), config, |mock| mock);

    session.reset_target().unwrap();

    assert_eq!(
        session.host().events,
        vec![
            PinEvent::Mode(SWDIO, PinMode::Input),
            PinEvent::Mode(SWCLK, PinMode::Input),
            PinEvent::Mode(UART_TX, PinMode::Input),
            PinEvent::Level(RESET, false),
            PinEvent::Mode(RESET, PinMode::Output),
            PinEvent::Sleep(10),
            PinEvent::Mode(RESET, PinMode::Input),
            PinEvent::Sleep(100),
            PinEvent::Mode(SWDIO, PinMode::InputPullUp),
            PinEvent::Mode(SWCLK, PinMode::InputPullUp),
        ]
    );
    assert_eq!(session.host().hardware_resets, 1);
}

#[test]
fn hardware_reset_leaves_debug_pins_pulled_up() {
    let config = LinkConfig::new(SWDIO, SWCLK).with_reset(RESET);
    let mut session = session_with(Target::rp2040(), config, |mock| mock);
    session.begin().unwrap();

    session.reset_target().unwrap();
    session.end();

    let debug_pins: Vec<_> = session
        .host()
        .events
        .iter()
        .filter(|event| matches!(event, PinEvent::Mode(pin, _) if *pin == SWDIO || *pin == SWCLK))
        .copied()
        .collect();
    assert_eq!(
        debug_pins[debug_pins.len() - 2..],
        [
            PinEvent::Mode(SWDIO, PinMode::InputPullUp),
            PinEvent::Mode(SWCLK, PinMode::InputPullUp),
        ]
    );
}

#[test]
fn failed_hardware_reset_still_disconnects() {
    let config = LinkConfig::new(SWDIO, SWCLK)
        .with_reset(RESET)
        .with_extra_pin(UART_TX);
    let mut session = session_with(Target::rp2040(), config, |mock| mock);
    session.begin().unwrap();
    session.host_mut().fail_mode_changes(UART_TX);

    let result = session.reset_target();

    assert_eq!(result.map_err(|e| e.kind()), Err(ErrorKind::Bus));
    assert!(!session.is_connected());
    assert_eq!(session.host().hardware_resets, 0);
}

#[test]
fn hardware_reset_disconnects() {
    let config = LinkConfig::new(SWDIO, SWCLK).with_reset(RESET);
    let mut session = session_with(Target::rp2040(), config, |mock| mock);
    session.begin().unwrap();

    session.reset_target().unwrap();

    assert!(!session.is_connected());
    assert!(!session.host().is_selected());

    // The target is dormant again and can be woken up.
    session.begin().unwrap();
    assert_eq!(session.host().wakes, 2);
}

#[test]
fn system_reset_without_reset_pin() {
    let mut session = rp2040_session();
    session.begin().unwrap();

    session.reset_target().unwrap();

    assert_eq!(session.host().reset_requests, 1);
    assert!(!session.is_connected());
}

#[test]
fn system_reset_requires_connection() {
    let mut session = rp2040_session();

    let result = session.reset_target();

    assert_eq!(result.map_err(|e| e.kind()), Err(ErrorKind::NotConnected));
    assert!(session.host().events.is_empty());
}

#[test]
fn conflicting_pins_are_rejected() {
    let config = LinkConfig::new(SWDIO, SWCLK).with_reset(SWCLK);
    let mock = MockTarget::new(&Target::rp2040(), &config);

    let result = Session::new(mock, config, Target::rp2040());

    assert_eq!(result.map(|_| ()).map_err(|e| e.kind()), Err(ErrorKind::InvalidConfig));
}

#[test]
fn riscv_system_reset_uses_ndmreset() {
    let config = LinkConfig::new(SWDIO, SWCLK);
    let mut session = session_with(Target::rp2350_riscv(), config, |mock| mock);
    session.begin().unwrap();

    session.reset_target().unwrap();

    assert_eq!(session.host().reset_requests, 1);
}
