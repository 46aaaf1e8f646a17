use crate::constants::{G_GRAV, RSUN_PER_DAY_TO_M_PER_S};
use crate::error::FitError;
use crate::float_trait::LikeFloat;
use crate::orbit::kepler::{eccentric_anomaly_generic, eccentric_from_true, true_anomaly};

/// Orbital elements of a single planet in the (day, R_sun, M_sun) unit system
#[derive(Clone, Copy, Debug)]
pub struct OrbitElements<T> {
    pub period: T,
    /// Time of a mid-transit
    pub t0: T,
    /// Impact parameter in stellar radii
    pub b: T,
    pub ecc: T,
    /// Cosine of the argument of periastron
    pub cos_w: T,
    /// Sine of the argument of periastron
    pub sin_w: T,
    pub m_star: T,
    pub r_star: T,
    pub m_planet: T,
}

/// Two-body Keplerian orbit of a planet around its host star
///
/// The observer looks along the $+z$ axis, a transit happens when the planet crosses the stellar
/// disk with $z > 0$ at true anomaly $f = \pi / 2 - \omega$.
#[derive(Clone, Debug)]
pub struct KeplerianOrbit<T> {
    period: T,
    /// Mean motion
    n: T,
    t_periastron: T,
    /// Relative orbit semi-major axis
    a: T,
    ecc: T,
    cos_w: T,
    sin_w: T,
    cos_i: T,
    sin_i: T,
    r_star: T,
    /// RV semi-amplitude of the star, m/s
    k: T,
}

impl<T: LikeFloat> KeplerianOrbit<T> {
    pub fn new(el: OrbitElements<T>) -> Result<Self, FitError> {
        check_support("period", el.period.value(), |x| x > 0.0)?;
        check_support("m_star", el.m_star.value(), |x| x > 0.0)?;
        check_support("r_star", el.r_star.value(), |x| x > 0.0)?;
        check_support("m_planet", el.m_planet.value(), |x| x >= 0.0)?;
        check_support("ecc", el.ecc.value(), |x| (0.0..1.0).contains(&x))?;
        check_support("b", el.b.value(), |x| x >= 0.0)?;

        let m_tot = el.m_star + el.m_planet;
        let n = T::tau() / el.period;
        let a = T::cube_root(T::from_f64(G_GRAV) * m_tot / (n * n));
        let one_m_e2 = T::one() - el.ecc * el.ecc;
        let cos_i = el.b * el.r_star * (T::one() + el.ecc * el.sin_w) / (a * one_m_e2);
        check_support("cos_i", cos_i.value(), |x| (0.0..1.0).contains(&x))?;
        let sin_i = T::sqrt(T::one() - cos_i * cos_i);

        let w = T::atan2(el.sin_w, el.cos_w);
        let f_transit = T::pi() * T::half() - w;
        let e_transit = eccentric_from_true(f_transit, el.ecc);
        let m_transit = e_transit - el.ecc * e_transit.sin();
        let t_periastron = el.t0 - m_transit / n;

        let k = n * a * sin_i / one_m_e2.sqrt() * el.m_planet / m_tot
            * T::from_f64(RSUN_PER_DAY_TO_M_PER_S);

        Ok(Self {
            period: el.period,
            n,
            t_periastron,
            a,
            ecc: el.ecc,
            cos_w: el.cos_w,
            sin_w: el.sin_w,
            cos_i,
            sin_i,
            r_star: el.r_star,
            k,
        })
    }

    pub fn period(&self) -> T {
        self.period
    }

    pub fn semi_major_axis(&self) -> T {
        self.a
    }

    pub fn cos_inclination(&self) -> T {
        self.cos_i
    }

    pub fn semi_amplitude(&self) -> T {
        self.k
    }

    /// True anomaly and distance from the star at time `t`
    fn true_anomaly_radius(&self, t: f64) -> (T, T) {
        let mean_anomaly = self.n * (T::from_f64(t) - self.t_periastron);
        let e_anom = eccentric_anomaly_generic(mean_anomaly, self.ecc);
        let f = true_anomaly(e_anom, self.ecc);
        let r = self.a * (T::one() - self.ecc * e_anom.cos());
        (f, r)
    }

    /// Planet position relative to the star, R_sun
    pub fn position(&self, t: f64) -> [T; 3] {
        let (f, r) = self.true_anomaly_radius(t);
        // sin and cos of w + f
        let (sin_f, cos_f) = f.sin_cos();
        let cos_u = self.cos_w * cos_f - self.sin_w * sin_f;
        let sin_u = self.sin_w * cos_f + self.cos_w * sin_f;
        [-r * cos_u, -r * sin_u * self.cos_i, r * sin_u * self.sin_i]
    }

    /// Projected separation in stellar radii and whether the planet is in front of the star
    pub fn sky_separation(&self, t: f64) -> (T, bool) {
        let [x, y, z] = self.position(t);
        let d2 = (x * x + y * y) / (self.r_star * self.r_star);
        (T::sqrt_or_zero(d2), z.value() > 0.0)
    }

    /// Line-of-sight velocity of the star induced by the planet, m/s, positive is receding
    pub fn radial_velocity(&self, t: f64) -> T {
        let (f, _r) = self.true_anomaly_radius(t);
        let (sin_f, cos_f) = f.sin_cos();
        let cos_u = self.cos_w * cos_f - self.sin_w * sin_f;
        self.k * (cos_u + self.ecc * self.cos_w)
    }
}

fn check_support(
    parameter: &'static str,
    value: f64,
    valid: impl Fn(f64) -> bool,
) -> Result<(), FitError> {
    if value.is_finite() && valid(value) {
        Ok(())
    } else {
        Err(FitError::ParameterOutOfSupport { parameter, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::constants::M_EARTH_IN_M_SUN;

    use approx::assert_relative_eq;
    use hyperdual::Hyperdual;

    fn elements(ecc: f64, w: f64) -> OrbitElements<f64> {
        OrbitElements {
            period: 10.0,
            t0: 3.0,
            b: 0.3,
            ecc,
            cos_w: w.cos(),
            sin_w: w.sin(),
            m_star: 1.0,
            r_star: 1.0,
            m_planet: 10.0 * M_EARTH_IN_M_SUN,
        }
    }

    #[test]
    fn transit_happens_at_t0_with_impact_parameter() {
        for &(ecc, w) in &[(0.0, 0.0), (0.3, 1.0), (0.6, -2.0)] {
            let orbit = KeplerianOrbit::new(elements(ecc, w)).unwrap();
            let (d, in_front) = orbit.sky_separation(3.0);
            assert!(in_front);
            assert_relative_eq!(d, 0.3, max_relative = 1e-8);
            let [x, _, _] = orbit.position(3.0);
            assert!(x.abs() < 1e-8);
            let (_, in_front_half) = orbit.sky_separation(8.0);
            if ecc == 0.0 {
                assert!(!in_front_half);
            }
        }
    }

    #[test]
    fn circular_semi_major_axis_and_rv() {
        let orbit = KeplerianOrbit::new(elements(0.0, 0.0)).unwrap();
        // About 0.0908 au for 10 days around the Sun
        assert_relative_eq!(orbit.semi_major_axis() / 215.032, 0.09085, max_relative = 1e-3);
        // About 3 m/s for 10 Earth masses
        let k = orbit.semi_amplitude();
        assert!(k > 2.5 && k < 3.5, "{k}");
        assert_relative_eq!(orbit.radial_velocity(3.0), 0.0, epsilon = 1e-9);
        assert_relative_eq!(orbit.radial_velocity(0.5), k, max_relative = 1e-9);
    }

    #[test]
    fn grazing_geometry_is_out_of_support() {
        let mut el = elements(0.0, 0.0);
        el.b = 1e3;
        assert!(matches!(
            KeplerianOrbit::new(el),
            Err(FitError::ParameterOutOfSupport {
                parameter: "cos_i",
                ..
            })
        ));
        el.b = 0.3;
        el.ecc = 1.2;
        assert!(KeplerianOrbit::new(el).is_err());
    }

    #[test]
    fn rv_gradient_matches_finite_difference() {
        let t = 5.3;
        let rv = |period: f64| {
            let mut el = elements(0.2, 0.7);
            el.period = period;
            KeplerianOrbit::new(el).unwrap().radial_velocity(t)
        };
        let mut period = Hyperdual::<f64, 2>::from_real(10.0);
        period[1] = 1.0;
        let el = OrbitElements {
            period,
            t0: Hyperdual::from_real(3.0),
            b: Hyperdual::from_real(0.3),
            ecc: Hyperdual::from_real(0.2),
            cos_w: Hyperdual::from_real(0.7f64.cos()),
            sin_w: Hyperdual::from_real(0.7f64.sin()),
            m_star: Hyperdual::from_real(1.0),
            r_star: Hyperdual::from_real(1.0),
            m_planet: Hyperdual::from_real(10.0 * M_EARTH_IN_M_SUN),
        };
        let dual = KeplerianOrbit::new(el).unwrap().radial_velocity(t);
        let h = 1e-6;
        let numeric = (rv(10.0 + h) - rv(10.0 - h)) / (2.0 * h);
        assert_relative_eq!(dual.real(), rv(10.0), max_relative = 1e-12);
        assert_relative_eq!(dual[1], numeric, max_relative = 1e-5);
    }

    #[test]
    fn semi_major_axis_derivative_follows_third_law() {
        let mut period = Hyperdual::<f64, 2>::from_real(10.0);
        period[1] = 1.0;
        let el = OrbitElements {
            period,
            t0: Hyperdual::from_real(3.0),
            b: Hyperdual::from_real(0.3),
            ecc: Hyperdual::from_real(0.0),
            cos_w: Hyperdual::from_real(1.0),
            sin_w: Hyperdual::from_real(0.0),
            m_star: Hyperdual::from_real(1.0),
            r_star: Hyperdual::from_real(1.0),
            m_planet: Hyperdual::from_real(10.0 * M_EARTH_IN_M_SUN),
        };
        let a = KeplerianOrbit::new(el).unwrap().semi_major_axis();
        // a ~ P^(2/3)
        assert_relative_eq!(a[1], 2.0 * a.real() / 30.0, max_relative = 1e-12);
    }
}
