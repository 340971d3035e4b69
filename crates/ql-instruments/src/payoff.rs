//! Option payoffs.
//!
//! A closed set of payoff kinds; each maps the underlying price at exercise
//! to a cash amount.

use ql_core::{ensure, errors::Result, Real};
use std::fmt;

/// Option type (call or put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OptionType {
    /// A call option (right to buy).
    Call,
    /// A put option (right to sell).
    Put,
}

impl OptionType {
    /// +1 for Call, −1 for Put.
    pub fn sign(self) -> Real {
        match self {
            OptionType::Call => 1.0,
            OptionType::Put => -1.0,
        }
    }

    /// The other option type.
    pub fn opposite(self) -> Self {
        match self {
            OptionType::Call => OptionType::Put,
            OptionType::Put => OptionType::Call,
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionType::Call => write!(f, "Call"),
            OptionType::Put => write!(f, "Put"),
        }
    }
}

/// Terminal (or exercise) payoff of an option.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Payoff {
    /// `max(φ(S − K), 0)`.
    PlainVanilla {
        /// Option type.
        option_type: OptionType,
        /// Strike.
        strike: Real,
    },
    /// `cash` if `φ(S − K) > 0`.
    CashOrNothing {
        /// Option type.
        option_type: OptionType,
        /// Strike.
        strike: Real,
        /// Fixed amount paid in the money.
        cash: Real,
    },
    /// `S` if `φ(S − K) > 0`.
    AssetOrNothing {
        /// Option type.
        option_type: OptionType,
        /// Strike.
        strike: Real,
    },
    /// `φ(S − K₂)` if `φ(S − K₁) ≥ 0`; may be negative.
    Gap {
        /// Option type.
        option_type: OptionType,
        /// Trigger strike `K₁`.
        strike: Real,
        /// Payoff strike `K₂`.
        second_strike: Real,
    },
}

impl Payoff {
    /// Plain vanilla payoff.
    pub fn vanilla(option_type: OptionType, strike: Real) -> Self {
        Payoff::PlainVanilla {
            option_type,
            strike,
        }
    }

    /// Cash-or-nothing payoff.
    pub fn cash_or_nothing(option_type: OptionType, strike: Real, cash: Real) -> Self {
        Payoff::CashOrNothing {
            option_type,
            strike,
            cash,
        }
    }

    /// Asset-or-nothing payoff.
    pub fn asset_or_nothing(option_type: OptionType, strike: Real) -> Self {
        Payoff::AssetOrNothing {
            option_type,
            strike,
        }
    }

    /// Gap payoff.
    pub fn gap(option_type: OptionType, strike: Real, second_strike: Real) -> Self {
        Payoff::Gap {
            option_type,
            strike,
            second_strike,
        }
    }

    /// Payoff for the underlying price `price`.
    pub fn value(&self, price: Real) -> Real {
        let phi = self.option_type().sign();
        match *self {
            Payoff::PlainVanilla { strike, .. } => (phi * (price - strike)).max(0.0),
            Payoff::CashOrNothing { strike, cash, .. } => {
                if phi * (price - strike) > 0.0 {
                    cash
                } else {
                    0.0
                }
            }
            Payoff::AssetOrNothing { strike, .. } => {
                if phi * (price - strike) > 0.0 {
                    price
                } else {
                    0.0
                }
            }
            Payoff::Gap {
                strike,
                second_strike,
                ..
            } => {
                if phi * (price - strike) >= 0.0 {
                    phi * (price - second_strike)
                } else {
                    0.0
                }
            }
        }
    }

    /// The option type.
    pub fn option_type(&self) -> OptionType {
        match *self {
            Payoff::PlainVanilla { option_type, .. }
            | Payoff::CashOrNothing { option_type, .. }
            | Payoff::AssetOrNothing { option_type, .. }
            | Payoff::Gap { option_type, .. } => option_type,
        }
    }

    /// The (trigger) strike.
    pub fn strike(&self) -> Real {
        match *self {
            Payoff::PlainVanilla { strike, .. }
            | Payoff::CashOrNothing { strike, .. }
            | Payoff::AssetOrNothing { strike, .. }
            | Payoff::Gap { strike, .. } => strike,
        }
    }

    /// Short name of the payoff kind.
    pub fn name(&self) -> &'static str {
        match self {
            Payoff::PlainVanilla { .. } => "Vanilla",
            Payoff::CashOrNothing { .. } => "CashOrNothing",
            Payoff::AssetOrNothing { .. } => "AssetOrNothing",
            Payoff::Gap { .. } => "Gap",
        }
    }

    /// `true` if `value(λS)` equals `λ · value(S)` with the strike scaled by `λ`.
    pub fn is_homogeneous(&self) -> bool {
        matches!(
            self,
            Payoff::PlainVanilla { .. } | Payoff::AssetOrNothing { .. } | Payoff::Gap { .. }
        )
    }

    /// The same payoff with all price levels multiplied by `factor`.
    pub fn scaled(&self, factor: Real) -> Self {
        match *self {
            Payoff::PlainVanilla {
                option_type,
                strike,
            } => Payoff::vanilla(option_type, strike * factor),
            Payoff::CashOrNothing {
                option_type,
                strike,
                cash,
            } => Payoff::cash_or_nothing(option_type, strike * factor, cash * factor),
            Payoff::AssetOrNothing {
                option_type,
                strike,
            } => Payoff::asset_or_nothing(option_type, strike * factor),
            Payoff::Gap {
                option_type,
                strike,
                second_strike,
            } => Payoff::gap(option_type, strike * factor, second_strike * factor),
        }
    }

    /// Check strikes and amounts.
    pub fn validate(&self) -> Result<()> {
        let k = self.strike();
        ensure!(k >= 0.0 && k.is_finite(), "invalid strike {k}");
        match *self {
            Payoff::CashOrNothing { cash, .. } => {
                ensure!(cash.is_finite(), "invalid cash amount {cash}")
            }
            Payoff::Gap { second_strike, .. } => ensure!(
                second_strike >= 0.0 && second_strike.is_finite(),
                "invalid second strike {second_strike}"
            ),
            _ => {}
        }
        Ok(())
    }
}

impl fmt::Display for Payoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} @ {}", self.name(), self.option_type(), self.strike())
    }
}
