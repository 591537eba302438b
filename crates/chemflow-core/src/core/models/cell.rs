use nalgebra::{Matrix3, Point3, Vector3};

const RIGHT_ANGLE_TOLERANCE: f64 = 1e-12;

/// A periodic cell defined by three lattice vectors stored as matrix rows.
///
/// An all-zero cell represents a non-periodic (molecular) structure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    vectors: Matrix3<f64>,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            vectors: Matrix3::zeros(),
        }
    }
}

impl Cell {
    /// Creates a cell from a matrix whose rows are the lattice vectors a, b and c.
    pub fn new(vectors: Matrix3<f64>) -> Self {
        Self { vectors }
    }

    pub fn from_vectors(a: Vector3<f64>, b: Vector3<f64>, c: Vector3<f64>) -> Self {
        Self::new(Matrix3::from_rows(&[a.transpose(), b.transpose(), c.transpose()]))
    }

    /// Creates an orthorhombic cell with the given edge lengths.
    pub fn orthorhombic(a: f64, b: f64, c: f64) -> Self {
        Self::new(Matrix3::from_diagonal(&Vector3::new(a, b, c)))
    }

    /// Builds the lattice vectors from cell parameters `[a, b, c, alpha, beta, gamma]`.
    ///
    /// Angles are in degrees. The standard orientation is used: `a` lies along
    /// x and `b` in the xy plane.
    pub fn from_parameters(parameters: [f64; 6]) -> Self {
        let [a, b, c, alpha, beta, gamma] = parameters;

        let cos_alpha = cos_degrees(alpha);
        let cos_beta = cos_degrees(beta);
        let (cos_gamma, sin_gamma) = if (gamma - 90.0).abs() < RIGHT_ANGLE_TOLERANCE {
            (0.0, 1.0)
        } else {
            let g = gamma.to_radians();
            (g.cos(), g.sin())
        };

        let va = Vector3::new(a, 0.0, 0.0);
        let vb = Vector3::new(b * cos_gamma, b * sin_gamma, 0.0);

        let cx = cos_beta;
        let cy = (cos_alpha - cos_beta * cos_gamma) / sin_gamma;
        let cz_squared = 1.0 - cx * cx - cy * cy;
        let cz = if cz_squared > 0.0 { cz_squared.sqrt() } else { 0.0 };
        let vc = Vector3::new(c * cx, c * cy, c * cz);

        Self::from_vectors(va, vb, vc)
    }

    pub fn vectors(&self) -> &Matrix3<f64> {
        &self.vectors
    }

    /// Returns lattice vector `i` (0 = a, 1 = b, 2 = c).
    pub fn vector(&self, i: usize) -> Vector3<f64> {
        self.vectors.row(i).transpose()
    }

    pub fn is_zero(&self) -> bool {
        self.vectors.iter().all(|v| *v == 0.0)
    }

    /// Lengths of the three lattice vectors.
    pub fn lengths(&self) -> [f64; 3] {
        [
            self.vector(0).norm(),
            self.vector(1).norm(),
            self.vector(2).norm(),
        ]
    }

    /// Cell angles `[alpha, beta, gamma]` in degrees.
    ///
    /// Angles involving a zero-length vector are reported as 90 degrees.
    pub fn angles(&self) -> [f64; 3] {
        let a = self.vector(0);
        let b = self.vector(1);
        let c = self.vector(2);
        [angle_between(&b, &c), angle_between(&a, &c), angle_between(&a, &b)]
    }

    /// Cell parameters `[a, b, c, alpha, beta, gamma]`.
    pub fn parameters(&self) -> [f64; 6] {
        let [a, b, c] = self.lengths();
        let [alpha, beta, gamma] = self.angles();
        [a, b, c, alpha, beta, gamma]
    }

    pub fn volume(&self) -> f64 {
        self.vectors.determinant().abs()
    }

    /// Converts a Cartesian position into fractional coordinates.
    ///
    /// Returns `None` for a singular cell.
    pub fn fractional(&self, position: &Point3<f64>) -> Option<Vector3<f64>> {
        let inverse = self.vectors.transpose().try_inverse()?;
        Some(inverse * position.coords)
    }

    /// Converts fractional coordinates into a Cartesian position.
    pub fn cartesian(&self, fractional: &Vector3<f64>) -> Point3<f64> {
        Point3::from(self.vectors.transpose() * fractional)
    }
}

fn cos_degrees(angle: f64) -> f64 {
    if (angle - 90.0).abs() < RIGHT_ANGLE_TOLERANCE {
        0.0
    } else {
        angle.to_radians().cos()
    }
}

fn angle_between(u: &Vector3<f64>, v: &Vector3<f64>) -> f64 {
    let norms = u.norm() * v.norm();
    if norms == 0.0 {
        return 90.0;
    }
    (u.dot(v) / norms).clamp(-1.0, 1.0).acos().to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-8, "{a} != {b}");
    }

    #[test]
    fn orthorhombic_cell_has_right_angles() {
        let cell = Cell::orthorhombic(10.0, 12.0, 14.0);
        assert_eq!(cell.parameters(), [10.0, 12.0, 14.0, 90.0, 90.0, 90.0]);
        assert_close(cell.volume(), 1680.0);
    }

    #[test]
    fn parameters_round_trip_for_triclinic_cell() {
        let parameters = [9.8, 10.1, 14.7, 88.5, 95.2, 119.6];
        let cell = Cell::from_parameters(parameters);
        for (expected, actual) in parameters.iter().zip(cell.parameters()) {
            assert_close(*expected, actual);
        }
    }

    #[test]
    fn standard_orientation_puts_a_on_x_and_b_in_xy_plane() {
        let cell = Cell::from_parameters([5.0, 6.0, 7.0, 80.0, 85.0, 70.0]);
        let a = cell.vector(0);
        let b = cell.vector(1);
        assert_close(a.y, 0.0);
        assert_close(a.z, 0.0);
        assert_close(b.z, 0.0);
    }

    #[test]
    fn zero_cell_reports_right_angles_and_is_zero() {
        let cell = Cell::default();
        assert!(cell.is_zero());
        assert_eq!(cell.parameters(), [0.0, 0.0, 0.0, 90.0, 90.0, 90.0]);
        assert!(cell.fractional(&Point3::new(1.0, 1.0, 1.0)).is_none());
    }

    #[test]
    fn fractional_and_cartesian_are_inverse() {
        let cell = Cell::from_parameters([5.0, 6.0, 7.0, 80.0, 85.0, 70.0]);
        let p = Point3::new(1.2, -0.4, 3.3);
        let frac = cell.fractional(&p).unwrap();
        let back = cell.cartesian(&frac);
        assert!((back - p).norm() < 1e-10);
    }
}
