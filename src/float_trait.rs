use hyperdual::Hyperdual;
use std::fmt::Debug;
use std::ops::{AddAssign, MulAssign};

/// Scalar type the forward models are written against
///
/// It is implemented for `f64`, which is used for values, and for [Hyperdual] numbers, which
/// carry directional derivatives through exactly the same code to give exact gradients.
pub trait LikeFloat:
    hyperdual::Float + AddAssign<Self> + MulAssign<Self> + Debug + Send + Sync + 'static
{
    /// Lift a constant
    fn from_f64(x: f64) -> Self;

    /// Real (value) part
    fn value(self) -> f64;

    #[inline]
    fn half() -> Self {
        Self::from_f64(0.5)
    }

    #[inline]
    fn two() -> Self {
        Self::from_f64(2.0)
    }

    #[inline]
    fn pi() -> Self {
        Self::from_f64(std::f64::consts::PI)
    }

    #[inline]
    fn tau() -> Self {
        Self::from_f64(std::f64::consts::TAU)
    }

    fn logistic(x: Self) -> Self {
        (Self::one() + Self::exp(-x)).recip()
    }

    /// Cube root of a positive value
    ///
    /// `Hyperdual::cbrt` carries the derivative $x^{-1/3} / 3$ instead of $x^{-2/3} / 3$.
    fn cube_root(x: Self) -> Self {
        x.powf(Self::from_f64(1.0 / 3.0))
    }

    /// Square root with zero derivative at zero instead of an infinite one
    fn sqrt_or_zero(x: Self) -> Self {
        if x.value() > 0.0 {
            x.sqrt()
        } else {
            Self::zero()
        }
    }
}

impl LikeFloat for f64 {
    #[inline]
    fn from_f64(x: f64) -> Self {
        x
    }

    #[inline]
    fn value(self) -> f64 {
        self
    }
}

impl<const N: usize> LikeFloat for Hyperdual<f64, N> {
    #[inline]
    fn from_f64(x: f64) -> Self {
        Hyperdual::from_real(x)
    }

    #[inline]
    fn value(self) -> f64 {
        self.real()
    }
}
