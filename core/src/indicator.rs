//! Status LED following an unrelated input
//!
//! Polled, not interrupt driven. A rising edge on the input turns the LED
//! off, a falling edge turns it on. The first sample always counts as an edge.

use embedded_hal::digital::{InputPin, OutputPin};

use crate::error::{Error, Result};

/// Level change seen between two polls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    Rising,
    Falling,
}

pub struct StatusIndicator<IN, OUT> {
    input: IN,
    led: OUT,
    last: Option<bool>,
}

impl<IN: InputPin, OUT: OutputPin> StatusIndicator<IN, OUT> {
    pub fn new(input: IN, led: OUT) -> Self {
        Self {
            input,
            led,
            last: None,
        }
    }

    /// Sample the input once and drive the LED on an edge
    pub fn poll(&mut self) -> Result<Option<Edge>> {
        let high = self.input.is_high().map_err(Error::pin)?;
        if self.last == Some(high) {
            return Ok(None);
        }
        self.last = Some(high);

        if high {
            self.led.set_low().map_err(Error::pin)?;
            info!("LED OFF");
            Ok(Some(Edge::Rising))
        } else {
            self.led.set_high().map_err(Error::pin)?;
            info!("LED ON");
            Ok(Some(Edge::Falling))
        }
    }

    /// Give the pins back
    pub fn release(self) -> (IN, OUT) {
        (self.input, self.led)
    }
}
