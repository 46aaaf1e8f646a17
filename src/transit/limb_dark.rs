use crate::float_trait::LikeFloat;

/// Quadratic limb-darkening law $I(\mu) = 1 - u_1 (1 - \mu) - u_2 (1 - \mu)^2$
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuadraticLimbDarkening<T> {
    pub u1: T,
    pub u2: T,
}

impl<T: LikeFloat> QuadraticLimbDarkening<T> {
    pub fn new(u1: T, u2: T) -> Self {
        Self { u1, u2 }
    }

    /// Coefficients from the Kipping (2013) unit-square parameterization
    ///
    /// Every $(q_1, q_2) \in [0, 1]^2$ maps to a positive and monotonically decreasing intensity
    /// profile.
    pub fn from_kipping(q1: T, q2: T) -> Self {
        let sqrt_q1 = T::sqrt_or_zero(q1);
        Self {
            u1: T::two() * sqrt_q1 * q2,
            u2: sqrt_q1 * (T::one() - T::two() * q2),
        }
    }

    /// Intensity at the distance `r` from the disk centre in stellar radii, unity at the centre
    pub fn intensity(&self, r: T) -> T {
        let one_m_mu = T::one() - T::sqrt_or_zero(T::one() - r * r);
        T::one() - self.u1 * one_m_mu - self.u2 * one_m_mu * one_m_mu
    }

    /// Disk-integrated intensity divided by $\pi$
    pub fn total_flux_factor(&self) -> T {
        T::one() - self.u1 / T::from_f64(3.0) - self.u2 / T::from_f64(6.0)
    }

    /// Radius ratio giving the approximate transit depth `depth` at impact parameter `b`
    pub fn ror_from_depth(&self, depth: T, b: T) -> T {
        T::sqrt(depth * self.total_flux_factor() / self.intensity(b))
    }

    /// Approximate transit depth of a planet with radius ratio `ror` at impact parameter `b`
    pub fn depth_from_ror(&self, ror: T, b: T) -> T {
        ror * ror * self.intensity(b) / self.total_flux_factor()
    }
}
