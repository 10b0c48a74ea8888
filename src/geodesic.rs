//! Geodesic direct and inverse problems on an ellipsoid of revolution.
//!
//! The solution follows C. F. F. Karney, *Algorithms for geodesics*, J. Geodesy 87 (2013),
//! with series expanded to sixth order in the third flattening. This is accurate to round-off
//! for |f| < 0.01. The inverse problem is solved with Newton's method on the longitude
//! residual, falling back to bisection, and gives up after a configurable number of
//! iterations.

use crate::error::ProjError;
use std::f64::consts::PI;

const TINY: f64 = 1.4916681462400413e-154;
const TOL0: f64 = f64::EPSILON;
const TOL1: f64 = 200.0 * TOL0;
const TOL2: f64 = 1.4901161193847656e-08;
const TOLB: f64 = TOL0;
const XTHRESH: f64 = 1000.0 * TOL2;

/// Newton iterations allowed before the solver switches to pure bisection.
const NEWTON_ITERATIONS: usize = 20;

/// Newton plus bisection iterations; enough for bisection to exhaust double precision.
pub const DEFAULT_MAX_ITERATIONS: usize = NEWTON_ITERATIONS + f64::MANTISSA_DIGITS as usize + 10;

fn sq(x: f64) -> f64 {
    x * x
}

/// Horner evaluation, coefficients in ascending order.
fn polyval(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// Error-free sum: `s + t == u + v` exactly.
fn sum_err(u: f64, v: f64) -> (f64, f64) {
    let s = u + v;
    let mut up = s - v;
    let mut vpp = s - up;
    up -= u;
    vpp -= v;
    let t = if s != 0.0 { -(up + vpp) } else { s };
    (s, t)
}

/// IEEE remainder with respect to `y`; exact.
fn remainder(x: f64, y: f64) -> f64 {
    let r = x % y;
    if r.abs() > y / 2.0 {
        r - y.copysign(r)
    } else {
        r
    }
}

/// Reduces an angle to [-180, 180].
pub(crate) fn ang_normalize(x: f64) -> f64 {
    let y = remainder(x, 360.0);
    if y.abs() == 180.0 { 180f64.copysign(x) } else { y }
}

/// `y - x` reduced to [-180, 180], returned with its round-off error.
fn ang_diff(x: f64, y: f64) -> (f64, f64) {
    let (d, t) = sum_err(remainder(-x, 360.0), remainder(y, 360.0));
    let (mut d, t) = sum_err(remainder(d, 360.0), t);
    if d == 0.0 || d.abs() == 180.0 {
        d = d.copysign(if t == 0.0 { y - x } else { -t });
    }
    (d, t)
}

/// Rounds tiny angles so that `0 - x` is exact.
fn ang_round(x: f64) -> f64 {
    const Z: f64 = 1.0 / 16.0;
    let mut y = x.abs();
    let w = Z - y;
    if w > 0.0 {
        y = Z - w;
    }
    y.copysign(x)
}

/// Sine and cosine of an angle in degrees, exact at multiples of 90.
fn sincosd(x: f64) -> (f64, f64) {
    let mut r = x % 360.0;
    let q = (r / 90.0).round_ties_even();
    r -= 90.0 * q;
    let (s, c) = r.to_radians().sin_cos();
    let (sx, cx) = match (q as i64) & 3 {
        0 => (s, c),
        1 => (c, -s),
        2 => (-s, -c),
        _ => (-c, s),
    };
    let sx = if sx == 0.0 { sx.copysign(x) } else { sx };
    (sx, cx + 0.0)
}

fn atan2d(y: f64, x: f64) -> f64 {
    let (mut y, mut x) = (y, x);
    let mut q = 0;
    if y.abs() > x.abs() {
        std::mem::swap(&mut x, &mut y);
        q = 2;
    }
    if x.is_sign_negative() {
        x = -x;
        q += 1;
    }
    let ang = y.atan2(x).to_degrees();
    match q {
        1 => 180f64.copysign(y) - ang,
        2 => 90.0 - ang,
        3 => -90.0 + ang,
        _ => ang,
    }
}

fn norm(s: f64, c: f64) -> (f64, f64) {
    let r = s.hypot(c);
    (s / r, c / r)
}

/// Clenshaw summation of a sine (`sinp`) or cosine series; `c[0]` is unused for sines.
fn sincos_series(sinp: bool, sinx: f64, cosx: f64, c: &[f64]) -> f64 {
    let n = if sinp { c.len() - 1 } else { c.len() };
    let mut k = c.len();
    let ar = 2.0 * (cosx - sinx) * (cosx + sinx);
    let mut y0 = if n & 1 == 1 {
        k -= 1;
        c[k]
    } else {
        0.0
    };
    let mut y1 = 0.0;
    for _ in 0..n / 2 {
        k -= 1;
        y1 = ar * y0 - y1 + c[k];
        k -= 1;
        y0 = ar * y1 - y0 + c[k];
    }
    if sinp {
        2.0 * sinx * cosx * y0
    } else {
        cosx * (y0 - y1)
    }
}

fn a1m1f(eps: f64) -> f64 {
    let e2 = eps * eps;
    let t = e2 * (1.0 / 4.0 + e2 * (1.0 / 64.0 + e2 / 256.0));
    (t + eps) / (1.0 - eps)
}

fn c1f(eps: f64) -> [f64; 7] {
    let e2 = eps * eps;
    let mut d = eps;
    let mut c = [0.0; 7];
    c[1] = d * (-1.0 / 2.0 + e2 * (3.0 / 16.0 - e2 / 32.0));
    d *= eps;
    c[2] = d * (-1.0 / 16.0 + e2 * (1.0 / 32.0 - e2 * 9.0 / 2048.0));
    d *= eps;
    c[3] = d * (-1.0 / 48.0 + e2 * 3.0 / 256.0);
    d *= eps;
    c[4] = d * (-5.0 / 512.0 + e2 * 3.0 / 512.0);
    d *= eps;
    c[5] = d * (-7.0 / 1280.0);
    d *= eps;
    c[6] = d * (-7.0 / 2048.0);
    c
}

fn c1pf(eps: f64) -> [f64; 7] {
    let e2 = eps * eps;
    let mut d = eps;
    let mut c = [0.0; 7];
    c[1] = d * (1.0 / 2.0 + e2 * (-9.0 / 32.0 + e2 * 205.0 / 1536.0));
    d *= eps;
    c[2] = d * (5.0 / 16.0 + e2 * (-37.0 / 96.0 + e2 * 1335.0 / 4096.0));
    d *= eps;
    c[3] = d * (29.0 / 96.0 - e2 * 75.0 / 128.0);
    d *= eps;
    c[4] = d * (539.0 / 1536.0 - e2 * 2391.0 / 2560.0);
    d *= eps;
    c[5] = d * (3467.0 / 7680.0);
    d *= eps;
    c[6] = d * (38081.0 / 61440.0);
    c
}

fn a2m1f(eps: f64) -> f64 {
    let e2 = eps * eps;
    let t = e2 * (-3.0 / 4.0 + e2 * (-7.0 / 64.0 - e2 * 11.0 / 256.0));
    (t - eps) / (1.0 + eps)
}

fn c2f(eps: f64) -> [f64; 7] {
    let e2 = eps * eps;
    let mut d = eps;
    let mut c = [0.0; 7];
    c[1] = d * (1.0 / 2.0 + e2 * (1.0 / 16.0 + e2 / 32.0));
    d *= eps;
    c[2] = d * (3.0 / 16.0 + e2 * (1.0 / 32.0 + e2 * 35.0 / 1024.0));
    d *= eps;
    c[3] = d * (5.0 / 48.0 + e2 * 5.0 / 256.0);
    d *= eps;
    c[4] = d * (35.0 / 512.0 + e2 * 7.0 / 512.0);
    d *= eps;
    c[5] = d * (63.0 / 1280.0);
    d *= eps;
    c[6] = d * (77.0 / 2048.0);
    c
}

/// Expansion parameter for a geodesic whose equatorial azimuth has cosine-squared term `k2`.
fn epsilon(k2: f64) -> f64 {
    k2 / (2.0 * (1.0 + (1.0 + k2).sqrt()) + k2)
}

/// Result of one evaluation of the longitude residual during the inverse iteration.
struct Lambda12 {
    lam12: f64,
    salp2: f64,
    calp2: f64,
    sig12: f64,
    ssig1: f64,
    csig1: f64,
    ssig2: f64,
    csig2: f64,
    eps: f64,
    dlam12: f64,
}

/// Starting guess for the inverse problem.
struct InverseStart {
    sig12: f64,
    salp1: f64,
    calp1: f64,
    salp2: f64,
    calp2: f64,
    dnm: f64,
}

/// Geodesic solver bound to one ellipsoid.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Geodesic {
    a: f64,
    f: f64,
    f1: f64,
    ep2: f64,
    n: f64,
    b: f64,
    etol2: f64,
    a3x: [f64; 6],
    c3x: [[f64; 5]; 6],
    max_iterations: usize,
}

impl Geodesic {
    /// `a` must be positive and `f` in `[0, 1)`; callers validate the shape.
    pub fn new(a: f64, f: f64) -> Self {
        let f1 = 1.0 - f;
        let e2 = f * (2.0 - f);
        let ep2 = e2 / sq(f1);
        let n = f / (2.0 - f);
        let etol2 = 0.1 * TOL2 / ((f.abs().max(0.001) * (1.0 - f / 2.0).min(1.0)) / 2.0).sqrt();
        let a3x = [
            1.0,
            (n - 1.0) / 2.0,
            (-2.0 - n + 3.0 * n * n) / 8.0,
            -(1.0 + 3.0 * n + n * n) / 16.0,
            -(3.0 + 2.0 * n) / 64.0,
            -3.0 / 128.0,
        ];
        let c3x = [
            [0.0; 5],
            [
                (1.0 - n) / 4.0,
                (1.0 - n * n) / 8.0,
                (3.0 + 3.0 * n - n * n) / 64.0,
                (5.0 + 2.0 * n) / 128.0,
                3.0 / 128.0,
            ],
            [
                (2.0 - 3.0 * n + n * n) / 32.0,
                (3.0 - 2.0 * n - 3.0 * n * n) / 64.0,
                (3.0 + n) / 128.0,
                5.0 / 256.0,
                0.0,
            ],
            [
                (5.0 - 9.0 * n + 5.0 * n * n) / 192.0,
                (9.0 - 10.0 * n) / 384.0,
                7.0 / 512.0,
                0.0,
                0.0,
            ],
            [(7.0 - 14.0 * n) / 512.0, 7.0 / 512.0, 0.0, 0.0, 0.0],
            [21.0 / 2560.0, 0.0, 0.0, 0.0, 0.0],
        ];
        Geodesic {
            a,
            f,
            f1,
            ep2,
            n,
            b: a * f1,
            etol2,
            a3x,
            c3x,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    fn a3f(&self, eps: f64) -> f64 {
        polyval(&self.a3x, eps)
    }

    fn c3f(&self, eps: f64) -> [f64; 6] {
        let mut c = [0.0; 6];
        let mut mult = 1.0;
        for l in 1..6 {
            mult *= eps;
            c[l] = mult * polyval(&self.c3x[l], eps);
        }
        c
    }

    /// Reduced distance `s12/b`, reduced length `m12/b` and `A1 - A2`.
    #[allow(clippy::too_many_arguments)]
    fn lengths(
        &self,
        eps: f64,
        sig12: f64,
        ssig1: f64,
        csig1: f64,
        dn1: f64,
        ssig2: f64,
        csig2: f64,
        dn2: f64,
    ) -> (f64, f64, f64) {
        let ca = c1f(eps);
        let cb = c2f(eps);
        let mut a1 = a1m1f(eps);
        let mut a2 = a2m1f(eps);
        let m0 = a1 - a2;
        a1 += 1.0;
        a2 += 1.0;
        let b1 = sincos_series(true, ssig2, csig2, &ca) - sincos_series(true, ssig1, csig1, &ca);
        let s12b = a1 * (sig12 + b1);
        let b2 = sincos_series(true, ssig2, csig2, &cb) - sincos_series(true, ssig1, csig1, &cb);
        let j12 = m0 * sig12 + (a1 * b1 - a2 * b2);
        let m12b = dn2 * (csig1 * ssig2) - dn1 * (ssig1 * csig2) - csig1 * csig2 * j12;
        (s12b, m12b, m0)
    }

    /// Largest positive root of k^4 + 2k^3 - (x^2 + y^2 - 1)k^2 - 2y^2k - y^2 = 0.
    fn astroid(x: f64, y: f64) -> f64 {
        let p = sq(x);
        let q = sq(y);
        let r = (p + q - 1.0) / 6.0;
        if q == 0.0 && r <= 0.0 {
            return 0.0;
        }
        let s = p * q / 4.0;
        let r2 = sq(r);
        let r3 = r * r2;
        let disc = s * (s + 2.0 * r3);
        let mut u = r;
        if disc >= 0.0 {
            let mut t3 = s + r3;
            t3 += if t3 < 0.0 { -disc.sqrt() } else { disc.sqrt() };
            let t = t3.cbrt();
            u += t + if t != 0.0 { r2 / t } else { 0.0 };
        } else {
            let ang = (-disc).sqrt().atan2(-(s + r3));
            u += 2.0 * r * (ang / 3.0).cos();
        }
        let v = (sq(u) + q).sqrt();
        let uv = if u < 0.0 { q / (v - u) } else { u + v };
        let w = (uv - q) / (2.0 * v);
        uv / ((uv + sq(w)).sqrt() + w)
    }

    #[allow(clippy::too_many_arguments)]
    fn inverse_start(
        &self,
        sbet1: f64,
        cbet1: f64,
        sbet2: f64,
        cbet2: f64,
        lam12: f64,
        slam12: f64,
        clam12: f64,
    ) -> InverseStart {
        let mut start = InverseStart {
            sig12: -1.0,
            salp1: 0.0,
            calp1: 0.0,
            salp2: 0.0,
            calp2: 0.0,
            dnm: 0.0,
        };
        let sbet12 = sbet2 * cbet1 - cbet2 * sbet1;
        let cbet12 = cbet2 * cbet1 + sbet2 * sbet1;
        let sbet12a = sbet2 * cbet1 + cbet2 * sbet1;
        let shortline = cbet12 >= 0.0 && sbet12 < 0.5 && cbet2 * lam12 < 0.5;
        let (mut somg12, mut comg12) = if shortline {
            let mut sbetm2 = sq(sbet1 + sbet2);
            sbetm2 /= sbetm2 + sq(cbet1 + cbet2);
            start.dnm = (1.0 + self.ep2 * sbetm2).sqrt();
            let omg12 = lam12 / (self.f1 * start.dnm);
            omg12.sin_cos()
        } else {
            (slam12, clam12)
        };

        let mut salp1 = cbet2 * somg12;
        let mut calp1 = if comg12 >= 0.0 {
            sbet12 + cbet2 * sbet1 * sq(somg12) / (1.0 + comg12)
        } else {
            sbet12a - cbet2 * sbet1 * sq(somg12) / (1.0 - comg12)
        };
        let ssig12 = salp1.hypot(calp1);
        let csig12 = sbet1 * sbet2 + cbet1 * cbet2 * comg12;

        if shortline && ssig12 < self.etol2 {
            let salp2 = cbet1 * somg12;
            let calp2 = sbet12
                - cbet1
                    * sbet2
                    * if comg12 >= 0.0 {
                        sq(somg12) / (1.0 + comg12)
                    } else {
                        1.0 - comg12
                    };
            (start.salp2, start.calp2) = norm(salp2, calp2);
            start.sig12 = ssig12.atan2(csig12);
        } else if self.n.abs() > 0.1
            || csig12 >= 0.0
            || ssig12 >= 6.0 * self.n.abs() * PI * sq(cbet1)
        {
            // zeroth order spherical approximation is good enough
        } else {
            // nearly antipodal
            let lam12x = (-slam12).atan2(-clam12);
            let k2 = sq(sbet1) * self.ep2;
            let eps = epsilon(k2);
            let lamscale = self.f * cbet1 * self.a3f(eps) * PI;
            let betscale = lamscale * cbet1;
            let x = lam12x / lamscale;
            let y = sbet12a / betscale;
            if y > -TOL1 && x > -1.0 - XTHRESH {
                salp1 = (-x).min(1.0);
                calp1 = -(1.0 - sq(salp1)).sqrt();
            } else {
                let k = Geodesic::astroid(x, y);
                let omg12a = lamscale * (-x * k / (1.0 + k));
                (somg12, comg12) = omg12a.sin_cos();
                comg12 = -comg12;
                salp1 = cbet2 * somg12;
                calp1 = sbet12a - cbet2 * sbet1 * sq(somg12) / (1.0 - comg12);
            }
        }

        (start.salp1, start.calp1) = if salp1 > 0.0 {
            norm(salp1, calp1)
        } else {
            (1.0, 0.0)
        };
        start
    }

    #[allow(clippy::too_many_arguments)]
    fn lambda12(
        &self,
        sbet1: f64,
        cbet1: f64,
        dn1: f64,
        sbet2: f64,
        cbet2: f64,
        dn2: f64,
        salp1: f64,
        calp1: f64,
        slam120: f64,
        clam120: f64,
        diffp: bool,
    ) -> Lambda12 {
        let calp1 = if sbet1 == 0.0 && calp1 == 0.0 {
            -TINY
        } else {
            calp1
        };
        let salp0 = salp1 * cbet1;
        let calp0 = calp1.hypot(salp1 * sbet1);
        let somg1 = salp0 * sbet1;
        let comg1 = calp1 * cbet1;
        let (ssig1, csig1) = norm(sbet1, comg1);

        let salp2 = if cbet2 != cbet1 { salp0 / cbet2 } else { salp1 };
        let calp2 = if cbet2 != cbet1 || sbet2.abs() != -sbet1 {
            (sq(calp1 * cbet1)
                + if cbet1 < -sbet1 {
                    (cbet2 - cbet1) * (cbet1 + cbet2)
                } else {
                    (sbet1 - sbet2) * (sbet1 + sbet2)
                })
            .sqrt()
                / cbet2
        } else {
            calp1.abs()
        };
        let somg2 = salp0 * sbet2;
        let comg2 = calp2 * cbet2;
        let (ssig2, csig2) = norm(sbet2, comg2);

        let sig12 = ((csig1 * ssig2 - ssig1 * csig2).max(0.0) + 0.0)
            .atan2(csig1 * csig2 + ssig1 * ssig2);
        let somg12 = (comg1 * somg2 - somg1 * comg2).max(0.0) + 0.0;
        let comg12 = comg1 * comg2 + somg1 * somg2;
        let eta = (somg12 * clam120 - comg12 * slam120)
            .atan2(comg12 * clam120 + somg12 * slam120);

        let k2 = sq(calp0) * self.ep2;
        let eps = epsilon(k2);
        let c3a = self.c3f(eps);
        let b312 = sincos_series(true, ssig2, csig2, &c3a) - sincos_series(true, ssig1, csig1, &c3a);
        let domg12 = -self.f * self.a3f(eps) * salp0 * (sig12 + b312);
        let lam12 = eta + domg12;

        let dlam12 = if !diffp {
            0.0
        } else if calp2 == 0.0 {
            -2.0 * self.f1 * dn1 / sbet1
        } else {
            let (_, m12b, _) = self.lengths(eps, sig12, ssig1, csig1, dn1, ssig2, csig2, dn2);
            m12b * self.f1 / (calp2 * cbet2)
        };

        Lambda12 {
            lam12,
            salp2,
            calp2,
            sig12,
            ssig1,
            csig1,
            ssig2,
            csig2,
            eps,
            dlam12,
        }
    }

    /// Solves the inverse problem, returning `(azi1, azi2, s12)`.
    ///
    /// `azi2` is the forward azimuth at the second point. Latitudes must lie in [-90, 90].
    pub fn inverse(
        &self,
        lat1: f64,
        lon1: f64,
        lat2: f64,
        lon2: f64,
    ) -> Result<(f64, f64, f64), ProjError> {
        let (lon12, lon12s) = ang_diff(lon1, lon2);
        let mut lonsign: f64 = if lon12.is_sign_negative() { -1.0 } else { 1.0 };
        let lon12 = lonsign * ang_round(lon12);
        let lon12s = ang_round((180.0 - lon12) - lonsign * lon12s);
        let lam12 = lon12.to_radians();
        let (slam12, clam12) = if lon12 > 90.0 {
            let (s, c) = sincosd(lon12s);
            (s, -c)
        } else {
            sincosd(lon12)
        };

        let mut lat1 = ang_round(lat1);
        let mut lat2 = ang_round(lat2);
        // make lat1 the point furthest from the equator
        let swapp: f64 = if lat1.abs() < lat2.abs() { -1.0 } else { 1.0 };
        if swapp < 0.0 {
            lonsign = -lonsign;
            std::mem::swap(&mut lat1, &mut lat2);
        }
        // and put it in the southern hemisphere
        let latsign: f64 = if lat1.is_sign_negative() { 1.0 } else { -1.0 };
        lat1 *= latsign;
        lat2 *= latsign;

        let (sbet1, cbet1) = sincosd(lat1);
        let (sbet1, cbet1) = norm(sbet1 * self.f1, cbet1);
        let cbet1 = cbet1.max(TINY);
        let (sbet2, cbet2) = sincosd(lat2);
        let (mut sbet2, cbet2) = norm(sbet2 * self.f1, cbet2);
        let mut cbet2 = cbet2.max(TINY);

        if cbet1 < -sbet1 {
            if cbet2 == cbet1 {
                sbet2 = sbet1.copysign(sbet2);
            }
        } else if sbet2.abs() == -sbet1 {
            cbet2 = cbet1;
        }

        let dn1 = (1.0 + self.ep2 * sq(sbet1)).sqrt();
        let dn2 = (1.0 + self.ep2 * sq(sbet2)).sqrt();

        let mut meridian = lat1 == -90.0 || slam12 == 0.0;
        let mut s12x = 0.0;
        let (mut salp1, mut calp1, mut salp2, mut calp2) = (0.0, 0.0, 0.0, 0.0);

        if meridian {
            calp1 = clam12;
            salp1 = slam12;
            calp2 = 1.0;
            salp2 = 0.0;
            let ssig1 = sbet1;
            let csig1 = calp1 * cbet1;
            let ssig2 = sbet2;
            let csig2 = calp2 * cbet2;
            let sig12 = ((csig1 * ssig2 - ssig1 * csig2).max(0.0) + 0.0)
                .atan2(csig1 * csig2 + ssig1 * ssig2);
            let (s, m12x, _) = self.lengths(self.n, sig12, ssig1, csig1, dn1, ssig2, csig2, dn2);
            if sig12 < 1.0 || m12x >= 0.0 {
                // coincident points may come out as tiny negative lengths
                s12x = if sig12 < 3.0 * TINY || (sig12 < TOL0 && (s < 0.0 || m12x < 0.0)) {
                    0.0
                } else {
                    s * self.b
                };
            } else {
                // the shortest path is not along the meridian
                meridian = false;
            }
        }

        if !meridian && sbet1 == 0.0 && (self.f <= 0.0 || lon12s >= self.f * 180.0) {
            // along the equator
            calp1 = 0.0;
            calp2 = 0.0;
            salp1 = 1.0;
            salp2 = 1.0;
            s12x = self.a * lam12;
        } else if !meridian {
            let start = self.inverse_start(sbet1, cbet1, sbet2, cbet2, lam12, slam12, clam12);
            salp1 = start.salp1;
            calp1 = start.calp1;
            if start.sig12 >= 0.0 {
                salp2 = start.salp2;
                calp2 = start.calp2;
                s12x = start.sig12 * self.b * start.dnm;
            } else {
                let (mut salp1a, mut calp1a, mut salp1b, mut calp1b) = (TINY, 1.0, TINY, -1.0);
                let mut tripn = false;
                let mut tripb = false;
                let mut numit = 0;
                let solved = loop {
                    let step = self.lambda12(
                        sbet1,
                        cbet1,
                        dn1,
                        sbet2,
                        cbet2,
                        dn2,
                        salp1,
                        calp1,
                        slam12,
                        clam12,
                        numit < NEWTON_ITERATIONS,
                    );
                    let v = step.lam12;
                    if tripb || v.abs() < (if tripn { 8.0 } else { 1.0 }) * TOL0 {
                        break step;
                    }
                    if numit >= self.max_iterations {
                        return Err(ProjError::NumericDivergence { iterations: numit });
                    }
                    // update the bracket
                    if v > 0.0 && (numit > NEWTON_ITERATIONS || calp1 / salp1 > calp1b / salp1b)
                    {
                        salp1b = salp1;
                        calp1b = calp1;
                    } else if v < 0.0
                        && (numit > NEWTON_ITERATIONS || calp1 / salp1 < calp1a / salp1a)
                    {
                        salp1a = salp1;
                        calp1a = calp1;
                    }
                    numit += 1;
                    if numit <= NEWTON_ITERATIONS && step.dlam12 > 0.0 {
                        let dalp1 = -v / step.dlam12;
                        if dalp1.abs() < PI {
                            let (sdalp1, cdalp1) = dalp1.sin_cos();
                            let nsalp1 = salp1 * cdalp1 + calp1 * sdalp1;
                            if nsalp1 > 0.0 {
                                calp1 = calp1 * cdalp1 - salp1 * sdalp1;
                                (salp1, calp1) = norm(nsalp1, calp1);
                                tripn = v.abs() <= 16.0 * TOL0;
                                continue;
                            }
                        }
                    }
                    // bisection
                    (salp1, calp1) = norm((salp1a + salp1b) / 2.0, (calp1a + calp1b) / 2.0);
                    tripn = false;
                    tripb = (salp1a - salp1).abs() + (calp1a - calp1) < TOLB
                        || (salp1 - salp1b).abs() + (calp1 - calp1b) < TOLB;
                };
                salp2 = solved.salp2;
                calp2 = solved.calp2;
                let (s, _, _) = self.lengths(
                    solved.eps,
                    solved.sig12,
                    solved.ssig1,
                    solved.csig1,
                    dn1,
                    solved.ssig2,
                    solved.csig2,
                    dn2,
                );
                s12x = s * self.b;
            }
        }

        let s12 = 0.0 + s12x;
        if swapp < 0.0 {
            std::mem::swap(&mut salp1, &mut salp2);
            std::mem::swap(&mut calp1, &mut calp2);
        }
        salp1 *= swapp * lonsign;
        calp1 *= swapp * latsign;
        salp2 *= swapp * lonsign;
        calp2 *= swapp * latsign;
        Ok((atan2d(salp1, calp1), atan2d(salp2, calp2), s12))
    }

    pub fn line(&self, lat1: f64, lon1: f64, azi1: f64) -> GeodesicLine {
        GeodesicLine::new(self, lat1, lon1, azi1)
    }

    /// Solves the direct problem, returning `(lat2, lon2, azi2)`.
    pub fn direct(&self, lat1: f64, lon1: f64, azi1: f64, s12: f64) -> (f64, f64, f64) {
        self.line(lat1, lon1, azi1).position(s12)
    }
}

/// A geodesic leaving a fixed point at a fixed azimuth, for repeated direct solutions.
#[derive(Debug, Clone)]
pub(crate) struct GeodesicLine {
    lon1: f64,
    azi1: f64,
    b: f64,
    f1: f64,
    large_flattening: bool,
    salp0: f64,
    calp0: f64,
    ssig1: f64,
    csig1: f64,
    somg1: f64,
    comg1: f64,
    k2: f64,
    a1m1: f64,
    c1a: [f64; 7],
    c1pa: [f64; 7],
    b11: f64,
    stau1: f64,
    ctau1: f64,
    c3a: [f64; 6],
    a3c: f64,
    b31: f64,
}

impl GeodesicLine {
    fn new(geodesic: &Geodesic, lat1: f64, lon1: f64, azi1: f64) -> Self {
        let azi1 = ang_normalize(azi1);
        let (salp1, calp1) = sincosd(ang_round(azi1));
        let (sbet1, cbet1) = sincosd(ang_round(lat1));
        let (sbet1, cbet1) = norm(sbet1 * geodesic.f1, cbet1);
        let cbet1 = cbet1.max(TINY);

        let salp0 = salp1 * cbet1;
        let calp0 = calp1.hypot(salp1 * sbet1);
        let somg1 = salp0 * sbet1;
        let comg1 = if sbet1 != 0.0 || calp1 != 0.0 {
            cbet1 * calp1
        } else {
            1.0
        };
        let (ssig1, csig1) = norm(sbet1, comg1);

        let k2 = sq(calp0) * geodesic.ep2;
        let eps = epsilon(k2);
        let a1m1 = a1m1f(eps);
        let c1a = c1f(eps);
        let c1pa = c1pf(eps);
        let b11 = sincos_series(true, ssig1, csig1, &c1a);
        let (s, c) = b11.sin_cos();
        let stau1 = ssig1 * c + csig1 * s;
        let ctau1 = csig1 * c - ssig1 * s;
        let c3a = geodesic.c3f(eps);
        let a3c = -geodesic.f * salp0 * geodesic.a3f(eps);
        let b31 = sincos_series(true, ssig1, csig1, &c3a);

        GeodesicLine {
            lon1,
            azi1,
            b: geodesic.b,
            f1: geodesic.f1,
            large_flattening: geodesic.f.abs() > 0.01,
            salp0,
            calp0,
            ssig1,
            csig1,
            somg1,
            comg1,
            k2,
            a1m1,
            c1a,
            c1pa,
            b11,
            stau1,
            ctau1,
            c3a,
            a3c,
            b31,
        }
    }

    pub fn azimuth(&self) -> f64 {
        self.azi1
    }

    /// Point at distance `s12` metres along the line, as `(lat2, lon2, azi2)`.
    pub fn position(&self, s12: f64) -> (f64, f64, f64) {
        let tau12 = s12 / (self.b * (1.0 + self.a1m1));
        let (s, c) = tau12.sin_cos();
        let b12 = -sincos_series(
            true,
            self.stau1 * c + self.ctau1 * s,
            self.ctau1 * c - self.stau1 * s,
            &self.c1pa,
        );
        let mut sig12 = tau12 - (b12 - self.b11);
        let (mut ssig12, mut csig12) = sig12.sin_cos();
        if self.large_flattening {
            // one Newton step on the distance to correct the reversion
            let ssig2 = self.ssig1 * csig12 + self.csig1 * ssig12;
            let csig2 = self.csig1 * csig12 - self.ssig1 * ssig12;
            let b12 = sincos_series(true, ssig2, csig2, &self.c1a);
            let serr = (1.0 + self.a1m1) * (sig12 + (b12 - self.b11)) - s12 / self.b;
            sig12 -= serr / (1.0 + self.k2 * sq(ssig2)).sqrt();
            (ssig12, csig12) = sig12.sin_cos();
        }

        let ssig2 = self.ssig1 * csig12 + self.csig1 * ssig12;
        let mut csig2 = self.csig1 * csig12 - self.ssig1 * ssig12;
        let sbet2 = self.calp0 * ssig2;
        let mut cbet2 = self.salp0.hypot(self.calp0 * csig2);
        if cbet2 == 0.0 {
            // at a pole
            cbet2 = TINY;
            csig2 = TINY;
        }
        let salp2 = self.salp0;
        let calp2 = self.calp0 * csig2;
        let somg2 = self.salp0 * ssig2;
        let comg2 = csig2;

        let omg12 = (somg2 * self.comg1 - comg2 * self.somg1)
            .atan2(comg2 * self.comg1 + somg2 * self.somg1);
        let lam12 = omg12
            + self.a3c
                * (sig12 + (sincos_series(true, ssig2, csig2, &self.c3a) - self.b31));
        let lon12 = lam12.to_degrees();
        let lon2 = ang_normalize(ang_normalize(self.lon1) + ang_normalize(lon12));
        let lat2 = atan2d(sbet2, self.f1 * cbet2);
        let azi2 = atan2d(salp2, calp2);
        (lat2, lon2, azi2)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    fn wgs84() -> Geodesic {
        Geodesic::new(6378137.0, 1.0 / 298.257223563)
    }

    #[test]
    fn test_angle_helpers() {
        assert_eq!(ang_normalize(540.0), 180.0);
        assert_eq!(ang_normalize(-540.0), -180.0);
        assert_eq!(ang_normalize(370.0), 10.0);
        assert_eq!(sincosd(90.0), (1.0, 0.0));
        assert_eq!(sincosd(-180.0).1, -1.0);
        assert_eq!(atan2d(1.0, 0.0), 90.0);
        assert_eq!(atan2d(0.0, -1.0), 180.0);
        assert_eq!(ang_diff(170.0, -170.0).0, 20.0);
    }

    #[test]
    fn test_inverse_long_line() {
        // Wellington to Salamanca
        let (azi1, azi2, s12) = wgs84().inverse(-41.32, 174.81, 40.96, -5.50).unwrap();
        assert_relative_eq!(azi1, 161.06766998616, epsilon = 1e-9);
        assert_relative_eq!(azi2, 18.825195123247, epsilon = 1e-9);
        assert_relative_eq!(s12, 19959679.26735, epsilon = 1e-3);
    }

    #[test]
    fn test_direct_inverts_inverse() {
        let geodesic = wgs84();
        let (lat2, lon2, azi2) = geodesic.direct(40.6, -73.8, 45.0, 10_000_000.0);
        let (azi1, back, s12) = geodesic.inverse(40.6, -73.8, lat2, lon2).unwrap();
        assert_relative_eq!(azi1, 45.0, epsilon = 1e-9);
        assert_relative_eq!(back, azi2, epsilon = 1e-9);
        assert_relative_eq!(s12, 10_000_000.0, epsilon = 1e-6);
        assert_relative_eq!(lat2, 32.642844327605516, epsilon = 1e-9);
        assert_relative_eq!(lon2, 49.0110395832242, epsilon = 1e-9);
    }

    #[test]
    fn test_nearly_antipodal() {
        let geodesic = wgs84();
        let (azi1, _, s12) = geodesic.inverse(0.0, 0.0, 0.5, 179.5).unwrap();
        let (lat2, lon2, _) = geodesic.direct(0.0, 0.0, azi1, s12);
        assert_relative_eq!(lat2, 0.5, epsilon = 1e-8);
        assert_relative_eq!(lon2, 179.5, epsilon = 1e-8);
    }

    #[test]
    fn test_sphere_antipodes_follow_meridian() {
        let sphere = Geodesic::new(6371000.0, 0.0);
        let (azi1, azi2, s12) = sphere.inverse(0.0, 0.0, 0.0, 180.0).unwrap();
        assert_eq!(azi1, 0.0);
        assert_eq!(azi2, 180.0);
        assert_relative_eq!(s12, PI * 6371000.0, epsilon = 1e-6);
    }

    #[test]
    fn test_iteration_cap() {
        let geodesic = wgs84().with_max_iterations(0);
        let err = geodesic.inverse(0.0, 0.0, 0.5, 179.5).unwrap_err();
        assert_eq!(err, ProjError::NumericDivergence { iterations: 0 });
        // meridional lines are solved without iterating
        let (_, _, s12) = geodesic.inverse(10.0, 10.0, 20.0, 10.0).unwrap();
        assert_relative_eq!(s12, 1106511.420937261, epsilon = 1e-6);
    }

    #[test]
    fn test_line_reaches_pole() {
        let geodesic = wgs84();
        let (_, _, quarter) = geodesic.inverse(0.0, 0.0, 90.0, 0.0).unwrap();
        let (lat2, _, _) = geodesic.line(0.0, 0.0, 0.0).position(quarter);
        assert_relative_eq!(lat2, 90.0, epsilon = 1e-9);
    }
}
