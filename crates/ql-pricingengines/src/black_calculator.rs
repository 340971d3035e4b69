//! Black formula with Greeks for every payoff kind.
//!
//! The value is written as `D · (F·α + X·β)` where `D` is the discount
//! factor, `F` the forward and `X` the cash leg (strike, cash amount or
//! second strike).  The coefficients `α`, `β` and their derivatives with
//! respect to `d₁`, `d₂` depend on the payoff; every Greek follows from
//! differentiating that decomposition.

use ql_core::{ensure, errors::Result, Real, Time};
use ql_instruments::{OptionType, Payoff};
use ql_math::{comparison::close_to, normal_cdf, normal_pdf};

/// Black formula evaluated once for a payoff, forward, standard
/// deviation and discount factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlackCalculator {
    option_type: OptionType,
    strike: Real,
    forward: Real,
    std_dev: Real,
    discount: Real,
    variance: Real,
    d1: Real,
    d2: Real,
    alpha: Real,
    beta: Real,
    d_alpha: Real,
    d_beta: Real,
    x: Real,
}

impl BlackCalculator {
    /// Set up the formula for `payoff` at forward `forward`, total standard
    /// deviation `std_dev` and discount factor `discount`.
    pub fn new(payoff: &Payoff, forward: Real, std_dev: Real, discount: Real) -> Result<Self> {
        payoff.validate()?;
        ensure!(forward > 0.0, "positive forward value required: {forward} not allowed");
        ensure!(std_dev >= 0.0, "non-negative standard deviation required: {std_dev} not allowed");
        ensure!(discount > 0.0, "positive discount required: {discount} not allowed");

        let strike = payoff.strike();
        let variance = std_dev * std_dev;

        let (d1, d2, cum_d1, cum_d2, n_d1, n_d2) = if strike == 0.0 {
            (Real::MAX, Real::MAX, 1.0, 1.0, 0.0, 0.0)
        } else if std_dev >= Real::EPSILON {
            let d1 = (forward / strike).ln() / std_dev + 0.5 * std_dev;
            let d2 = d1 - std_dev;
            (d1, d2, normal_cdf(d1), normal_cdf(d2), normal_pdf(d1), normal_pdf(d2))
        } else if close_to(forward, strike) {
            (0.0, 0.0, 0.5, 0.5, 0.0, 0.0)
        } else if forward > strike {
            (Real::MAX, Real::MAX, 1.0, 1.0, 0.0, 0.0)
        } else {
            (Real::MIN, Real::MIN, 0.0, 0.0, 0.0, 0.0)
        };

        let mut x = strike;
        let (alpha, d_alpha, beta, d_beta) = match (payoff, payoff.option_type()) {
            (Payoff::PlainVanilla { .. }, OptionType::Call) | (Payoff::Gap { .. }, OptionType::Call) => {
                (cum_d1, n_d1, -cum_d2, -n_d2)
            }
            (Payoff::PlainVanilla { .. }, OptionType::Put) | (Payoff::Gap { .. }, OptionType::Put) => {
                (cum_d1 - 1.0, n_d1, 1.0 - cum_d2, -n_d2)
            }
            (Payoff::CashOrNothing { cash, .. }, option_type) => {
                x = *cash;
                match option_type {
                    OptionType::Call => (0.0, 0.0, cum_d2, n_d2),
                    OptionType::Put => (0.0, 0.0, 1.0 - cum_d2, -n_d2),
                }
            }
            (Payoff::AssetOrNothing { .. }, option_type) => {
                x = 0.0;
                match option_type {
                    OptionType::Call => (cum_d1, n_d1, 0.0, 0.0),
                    OptionType::Put => (1.0 - cum_d1, -n_d1, 0.0, 0.0),
                }
            }
        };
        if let Payoff::Gap { second_strike, .. } = payoff {
            x = *second_strike;
        }

        Ok(Self {
            option_type: payoff.option_type(),
            strike,
            forward,
            std_dev,
            discount,
            variance,
            d1,
            d2,
            alpha,
            beta,
            d_alpha,
            d_beta,
            x,
        })
    }

    /// Present value.
    pub fn value(&self) -> Real {
        self.discount * (self.forward * self.alpha + self.x * self.beta)
    }

    /// Sensitivity to the forward, discounted.
    pub fn delta_forward(&self) -> Real {
        let (d_alpha_df, d_beta_df) = self.forward_derivatives();
        self.discount * (d_alpha_df * self.forward + self.alpha + d_beta_df * self.x)
    }

    /// Sensitivity to the spot, given the spot the forward was computed from.
    pub fn delta(&self, spot: Real) -> Result<Real> {
        ensure!(spot > 0.0, "positive spot value required: {spot} not allowed");
        Ok(self.delta_forward() * self.forward / spot)
    }

    /// Second derivative with respect to the forward, discounted.
    pub fn gamma_forward(&self) -> Real {
        if self.std_dev == 0.0 {
            return 0.0;
        }
        let (d_alpha_df, d_beta_df) = self.forward_derivatives();
        let d2_alpha = -d_alpha_df / self.forward * (1.0 + self.d1 / self.std_dev);
        let d2_beta = -d_beta_df / self.forward * (1.0 + self.d2 / self.std_dev);
        self.discount * (d2_alpha * self.forward + 2.0 * d_alpha_df + d2_beta * self.x)
    }

    /// Second derivative with respect to the spot.
    pub fn gamma(&self, spot: Real) -> Result<Real> {
        ensure!(spot > 0.0, "positive spot value required: {spot} not allowed");
        let ratio = self.forward / spot;
        Ok(self.gamma_forward() * ratio * ratio)
    }

    /// Time decay per year, from the Black PDE with the rates implied by
    /// the discount and forward over `maturity`.
    pub fn theta(&self, spot: Real, maturity: Time) -> Result<Real> {
        ensure!(maturity >= 0.0, "maturity ({maturity}) must be non-negative");
        if close_to(maturity, 0.0) {
            return Ok(0.0);
        }
        let r = -self.discount.ln() / maturity;
        let q = -(self.forward * self.discount / spot).ln() / maturity;
        let delta = self.delta(spot)?;
        let gamma = self.gamma(spot)?;
        Ok(r * self.value() - (r - q) * spot * delta - 0.5 * self.variance * spot * spot * gamma / maturity)
    }

    /// Sensitivity to the volatility.
    pub fn vega(&self, maturity: Time) -> Result<Real> {
        ensure!(maturity >= 0.0, "negative maturity not allowed");
        if self.std_dev == 0.0 || self.strike == 0.0 {
            return Ok(0.0);
        }
        let log = (self.strike / self.forward).ln() / self.variance;
        let d1_ds = log + 0.5;
        let d2_ds = log - 0.5;
        Ok(self.discount
            * maturity.sqrt()
            * (self.d_alpha * d1_ds * self.forward + self.d_beta * d2_ds * self.x))
    }

    /// Sensitivity to the risk-free rate.
    pub fn rho(&self, maturity: Time) -> Result<Real> {
        ensure!(maturity >= 0.0, "negative maturity not allowed");
        let (a, b) = self.std_dev_derivatives();
        Ok(maturity
            * (self.discount * (a * self.forward + self.alpha * self.forward + b * self.x) - self.value()))
    }

    /// Sensitivity to the dividend yield.
    pub fn dividend_rho(&self, maturity: Time) -> Result<Real> {
        ensure!(maturity >= 0.0, "negative maturity not allowed");
        let (a, b) = self.std_dev_derivatives();
        Ok(-maturity * self.discount * (a * self.forward + self.alpha * self.forward + b * self.x))
    }

    /// Probability of finishing in the money, in the forward measure.
    pub fn itm_cash_probability(&self) -> Real {
        self.in_the_money(self.d2)
    }

    /// Probability of finishing in the money, in the asset measure.
    pub fn itm_asset_probability(&self) -> Real {
        self.in_the_money(self.d1)
    }

    /// Forward used by the formula.
    pub fn forward(&self) -> Real {
        self.forward
    }

    /// Discount factor used by the formula.
    pub fn discount(&self) -> Real {
        self.discount
    }

    fn in_the_money(&self, d: Real) -> Real {
        let cum = if self.std_dev == 0.0 || self.strike == 0.0 {
            if self.forward > self.strike {
                1.0
            } else {
                0.0
            }
        } else {
            normal_cdf(d)
        };
        match self.option_type {
            OptionType::Call => cum,
            OptionType::Put => 1.0 - cum,
        }
    }

    fn forward_derivatives(&self) -> (Real, Real) {
        if self.std_dev == 0.0 {
            return (0.0, 0.0);
        }
        let temp = self.std_dev * self.forward;
        (self.d_alpha / temp, self.d_beta / temp)
    }

    fn std_dev_derivatives(&self) -> (Real, Real) {
        if self.std_dev == 0.0 {
            return (0.0, 0.0);
        }
        (self.d_alpha / self.std_dev, self.d_beta / self.std_dev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn call(strike: Real) -> Payoff {
        Payoff::vanilla(OptionType::Call, strike)
    }

    fn forward(spot: Real, r: Real, q: Real, t: Time) -> Real {
        spot * ((r - q) * t).exp()
    }

    #[test]
    fn at_the_money_call_matches_textbook_value() {
        let f = forward(100.0, 0.05, 0.0, 1.0);
        let bc = BlackCalculator::new(&call(100.0), f, 0.2, (-0.05_f64).exp()).unwrap();
        assert_abs_diff_eq!(bc.value(), 10.4506, epsilon = 1e-4);
        assert_abs_diff_eq!(bc.delta(100.0).unwrap(), 0.63683, epsilon = 1e-5);
        assert_abs_diff_eq!(bc.gamma(100.0).unwrap(), 0.018762, epsilon = 1e-6);
        assert_abs_diff_eq!(bc.vega(1.0).unwrap(), 37.524, epsilon = 1e-3);
        assert_abs_diff_eq!(bc.rho(1.0).unwrap(), 53.232, epsilon = 1e-3);
        assert_abs_diff_eq!(bc.theta(100.0, 1.0).unwrap(), -6.4136, epsilon = 2e-3);
    }

    #[test]
    fn put_call_parity_holds() {
        let (s, r, q, t, vol) = (95.0, 0.03, 0.01, 0.75, 0.3);
        let f = forward(s, r, q, t);
        let d = (-r * t).exp();
        let c = BlackCalculator::new(&call(100.0), f, vol * t.sqrt(), d).unwrap();
        let p = BlackCalculator::new(&Payoff::vanilla(OptionType::Put, 100.0), f, vol * t.sqrt(), d).unwrap();
        assert_abs_diff_eq!(c.value() - p.value(), d * (f - 100.0), epsilon = 1e-10);
        assert_abs_diff_eq!(c.delta(s).unwrap() - p.delta(s).unwrap(), (-q * t).exp(), epsilon = 1e-10);
        assert_abs_diff_eq!(c.gamma(s).unwrap(), p.gamma(s).unwrap(), epsilon = 1e-10);
    }

    #[test]
    fn digital_legs_add_up_to_the_vanilla() {
        let (f, sd, d) = (102.0, 0.25, 0.97);
        let vanilla = BlackCalculator::new(&call(100.0), f, sd, d).unwrap().value();
        let asset = BlackCalculator::new(&Payoff::asset_or_nothing(OptionType::Call, 100.0), f, sd, d)
            .unwrap()
            .value();
        let cash = BlackCalculator::new(&Payoff::cash_or_nothing(OptionType::Call, 100.0, 100.0), f, sd, d)
            .unwrap()
            .value();
        assert_abs_diff_eq!(vanilla, asset - cash, epsilon = 1e-10);
    }

    #[test]
    fn delta_matches_a_bumped_value() {
        let (s, r, q, t, vol) = (100.0, 0.04, 0.02, 0.5, 0.25);
        let price = |s: Real| {
            BlackCalculator::new(&call(105.0), forward(s, r, q, t), vol * t.sqrt(), (-r * t).exp())
                .unwrap()
                .value()
        };
        let h = 1e-3;
        let bc = BlackCalculator::new(&call(105.0), forward(s, r, q, t), vol * t.sqrt(), (-r * t).exp()).unwrap();
        assert_abs_diff_eq!(bc.delta(s).unwrap(), (price(s + h) - price(s - h)) / (2.0 * h), epsilon = 1e-6);
        assert_abs_diff_eq!(
            bc.gamma(s).unwrap(),
            (price(s + h) - 2.0 * price(s) + price(s - h)) / (h * h),
            epsilon = 1e-4
        );
    }

    #[test]
    fn zero_volatility_gives_discounted_intrinsic_value() {
        let bc = BlackCalculator::new(&call(90.0), 100.0, 0.0, 0.9).unwrap();
        assert_abs_diff_eq!(bc.value(), 9.0, epsilon = 1e-12);
        assert_eq!(bc.gamma_forward(), 0.0);
        let otm = BlackCalculator::new(&call(110.0), 100.0, 0.0, 0.9).unwrap();
        assert_abs_diff_eq!(otm.value(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        assert!(BlackCalculator::new(&call(100.0), -1.0, 0.2, 1.0).is_err());
        assert!(BlackCalculator::new(&call(100.0), 100.0, -0.2, 1.0).is_err());
        assert!(BlackCalculator::new(&call(100.0), 100.0, 0.2, 0.0).is_err());
    }

    proptest::proptest! {
        #[test]
        fn put_call_parity_holds_for_any_inputs(
            forward in 10.0..300.0_f64,
            strike in 10.0..300.0_f64,
            std_dev in 0.0..1.5_f64,
            discount in 0.5..1.0_f64,
        ) {
            let c = BlackCalculator::new(&call(strike), forward, std_dev, discount).unwrap();
            let p = BlackCalculator::new(&Payoff::vanilla(OptionType::Put, strike), forward, std_dev, discount).unwrap();
            proptest::prop_assert!(c.value() >= 0.0 && c.value() <= discount * forward + 1e-9);
            proptest::prop_assert!((c.value() - p.value() - discount * (forward - strike)).abs() < 1e-8);
        }
    }
}
