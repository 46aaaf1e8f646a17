use crate::float_trait::LikeFloat;
use crate::transit::QuadraticLimbDarkening;

/// Fractional flux blocked by an opaque disk of radius `ror` at projected separation `z`
///
/// Both lengths are in stellar radii. The blocked intensity is integrated over `n_annuli` stellar
/// annuli spanning the radii covered by the planet:
/// $$
/// \delta = \frac{1}{\pi f_0} \sum_i I(\bar r_i) \left[A(r_{i+1}) - A(r_i)\right],
/// $$
/// where $A(r)$ is the area of the planet disk inside the circle of radius $r$. The sum is exact
/// for a uniform disk and is zero exactly when the disks do not overlap.
pub fn occultation<T: LikeFloat>(
    z: T,
    ror: T,
    ld: &QuadraticLimbDarkening<T>,
    n_annuli: usize,
) -> T {
    let (z_val, p_val) = (z.value(), ror.value());
    if p_val <= 0.0 || z_val >= 1.0 + p_val {
        return T::zero();
    }

    let r_lo = if z_val > p_val { z - ror } else { T::zero() };
    let (r_hi, area_hi) = if z_val + p_val < 1.0 {
        (z + ror, T::pi() * ror * ror)
    } else {
        (T::one(), overlap_area(T::one(), ror, z))
    };

    let step = (r_hi - r_lo) / T::from_f64(n_annuli as f64);
    let mut blocked = T::zero();
    let mut area_prev = T::zero();
    for i in 1..=n_annuli {
        let area = if i == n_annuli {
            area_hi
        } else {
            overlap_area(r_lo + step * T::from_f64(i as f64), ror, z)
        };
        let r_mid = r_lo + step * T::from_f64(i as f64 - 0.5);
        blocked += ld.intensity(r_mid) * (area - area_prev);
        area_prev = area;
    }
    blocked / (T::pi() * ld.total_flux_factor())
}

/// Area of intersection of a circle of radius `r` centred at the origin and a circle of radius
/// `p` centred at distance `z`
pub fn overlap_area<T: LikeFloat>(r: T, p: T, z: T) -> T {
    let (r_val, p_val, z_val) = (r.value(), p.value(), z.value());
    if z_val >= r_val + p_val {
        return T::zero();
    }
    if z_val <= (r_val - p_val).abs() {
        let rmin = if r_val < p_val { r } else { p };
        return T::pi() * rmin * rmin;
    }
    let two = T::two();
    let cos_r = clamp_unit((z * z + r * r - p * p) / (two * z * r));
    let cos_p = clamp_unit((z * z + p * p - r * r) / (two * z * p));
    let kite = T::sqrt_or_zero((-z + r + p) * (z + r - p) * (z - r + p) * (z + r + p));
    r * r * cos_r.acos() + p * p * cos_p.acos() - T::half() * kite
}

fn clamp_unit<T: LikeFloat>(x: T) -> T {
    if x.value() > 1.0 {
        T::one()
    } else if x.value() < -1.0 {
        -T::one()
    } else {
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use hyperdual::Hyperdual;
    use std::f64::consts::PI;

    #[test]
    fn no_overlap_is_exactly_zero() {
        let ld = QuadraticLimbDarkening::new(0.4, 0.2);
        assert_eq!(occultation(1.1, 0.1, &ld, 32), 0.0);
        assert_eq!(occultation(5.0, 0.1, &ld, 32), 0.0);
        assert_eq!(occultation(0.0, 0.0, &ld, 32), 0.0);
    }

    #[test]
    fn uniform_disk_is_exact() {
        let ld = QuadraticLimbDarkening::new(0.0, 0.0);
        // Full transit
        assert_relative_eq!(occultation(0.3, 0.1, &ld, 4), 0.01, max_relative = 1e-14);
        // Partial transit
        let (z, p) = (1.05, 0.1);
        let expected = overlap_area(1.0, p, z) / PI;
        assert_relative_eq!(occultation(z, p, &ld, 4), expected, max_relative = 1e-14);
        assert!(expected > 0.0 && expected < 0.005);
    }

    #[test]
    fn overlap_area_limits() {
        assert_relative_eq!(overlap_area(1.0, 0.1, 0.0), 0.01 * PI, max_relative = 1e-14);
        assert_relative_eq!(overlap_area(0.05, 0.1, 0.0), 0.0025 * PI, max_relative = 1e-14);
        assert_eq!(overlap_area(1.0, 0.1, 1.2), 0.0);
        // Half of a small disk lies inside when its centre is on a large circle
        assert_relative_eq!(overlap_area(100.0, 0.1, 100.0), 0.005 * PI, max_relative = 1e-3);
    }

    #[test]
    fn limb_darkened_centre_depth() {
        let (u1, u2) = (0.4, 0.25);
        let ld = QuadraticLimbDarkening::new(u1, u2);
        let p: f64 = 0.1;
        // Closed form of the intensity integral over a centred disk of radius p
        let mu_p = (1.0 - p * p).sqrt();
        let int_mu = (1.0 - mu_p.powi(3)) / 3.0;
        let int_mu2 = (1.0 - mu_p.powi(4)) / 4.0;
        let int_1 = 0.5 * p * p;
        let one_m_mu = int_1 - int_mu;
        let one_m_mu_sq = int_1 - 2.0 * int_mu + int_mu2;
        let expected =
            2.0 * (int_1 - u1 * one_m_mu - u2 * one_m_mu_sq) / (1.0 - u1 / 3.0 - u2 / 6.0);
        assert_relative_eq!(occultation(0.0, p, &ld, 64), expected, max_relative = 1e-5);
    }

    #[test]
    fn monotone_in_radius_ratio() {
        let ld = QuadraticLimbDarkening::new(0.5, 0.2);
        for &z in &[0.0, 0.4, 0.8, 0.95, 1.02] {
            let mut previous = 0.0;
            for i in 1..=40 {
                let p = 0.005 * i as f64;
                let depth = occultation(z, p, &ld, 32);
                assert!(depth >= previous, "z = {z}, p = {p}");
                previous = depth;
            }
        }
    }

    #[test]
    fn derivatives_are_finite_and_match_differences() {
        let ld = QuadraticLimbDarkening::new(0.4, 0.3);
        for &z in &[0.0, 0.2, 0.95, 1.05] {
            let p = 0.1;
            let mut p_dual = Hyperdual::<f64, 3>::from_real(p);
            p_dual[1] = 1.0;
            let mut z_dual = Hyperdual::<f64, 3>::from_real(z);
            z_dual[2] = 1.0;
            let ld_dual = QuadraticLimbDarkening::new(
                Hyperdual::from_real(ld.u1),
                Hyperdual::from_real(ld.u2),
            );
            let depth = occultation(z_dual, p_dual, &ld_dual, 32);
            assert!(depth[1].is_finite() && depth[2].is_finite());
            let h = 1e-6;
            let dp = (occultation(z, p + h, &ld, 32) - occultation(z, p - h, &ld, 32)) / (2.0 * h);
            assert_relative_eq!(depth[1], dp, max_relative = 1e-4);
            if z > 0.0 {
                let dz =
                    (occultation(z + h, p, &ld, 32) - occultation(z - h, p, &ld, 32)) / (2.0 * h);
                assert_relative_eq!(depth[2], dz, max_relative = 1e-4, epsilon = 1e-9);
            }
        }
    }
}
