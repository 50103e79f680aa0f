//! On-chip peripherals.
//!
//! - [`GpioPort`]: DDR/PORT/PIN port with INTn and PCINTn interrupt sources

mod gpio;

pub use gpio::{
    ExternalClockListener, ExternalInterrupt, GpioListener, GpioPort, GpioState, PinChangeInterrupt,
    PinOverrideMode, PinState, PortConfig, INT0, INT1, PCINT0, PCINT1, PCINT2, PORTA_CONFIG, PORTB_CONFIG,
    PORTC_CONFIG, PORTD_CONFIG,
};
