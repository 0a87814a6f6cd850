//! Periodic simulation cells.
//!
//! A [`SimulationCell`] is a parallelepiped spanned by the three columns of a
//! 3x3 matrix and translated to an origin point. Each cell axis can be periodic.
//! Reduced coordinates express a point in units of the cell vectors, so the cell
//! itself maps to the unit cube `[0, 1)^3`.

use nalgebra::{Matrix3, Point3, Vector3};

use crate::error::{MeshError, Result};

/// A parallelepiped domain with optional periodic boundary conditions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationCell {
    matrix: Matrix3<f64>,
    origin: Point3<f64>,
    pbc: [bool; 3],
    is_2d: bool,
}

impl SimulationCell {
    /// Creates a cell from its edge vectors (matrix columns), origin and periodicity flags.
    pub fn new(matrix: Matrix3<f64>, origin: Point3<f64>, pbc: [bool; 3]) -> Self {
        Self {
            matrix,
            origin,
            pbc,
            is_2d: false,
        }
    }

    /// Creates an axis-aligned box cell with its origin at zero.
    pub fn orthorhombic(size: Vector3<f64>, pbc: [bool; 3]) -> Self {
        Self::new(Matrix3::from_diagonal(&size), Point3::origin(), pbc)
    }

    /// Marks the cell as two-dimensional. The third axis is then never periodic.
    pub fn with_2d(mut self, is_2d: bool) -> Self {
        self.is_2d = is_2d;
        self
    }

    /// The cell matrix; its columns are the cell edge vectors.
    #[inline]
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    /// The origin corner of the cell.
    #[inline]
    pub fn origin(&self) -> Point3<f64> {
        self.origin
    }

    /// Returns the cell edge vector along axis `dim`.
    ///
    /// # Panics
    /// Panics if `dim >= 3`.
    #[inline]
    pub fn cell_vector(&self, dim: usize) -> Vector3<f64> {
        self.matrix.column(dim).into_owned()
    }

    /// The raw periodicity flags.
    #[inline]
    pub fn pbc(&self) -> [bool; 3] {
        self.pbc
    }

    /// Whether this is a two-dimensional cell.
    #[inline]
    pub fn is_2d(&self) -> bool {
        self.is_2d
    }

    /// Whether axis `dim` is periodic. The z axis of a 2-D cell never is.
    #[inline]
    pub fn has_pbc(&self, dim: usize) -> bool {
        self.pbc[dim] && !(self.is_2d && dim == 2)
    }

    /// Whether any axis is periodic.
    pub fn has_any_pbc(&self) -> bool {
        (0..3).any(|dim| self.has_pbc(dim))
    }

    /// Returns the inverse of the cell matrix.
    ///
    /// # Errors
    /// [`MeshError::SingularCell`] if the cell has zero volume.
    pub fn inverse(&self) -> Result<Matrix3<f64>> {
        if self.matrix.determinant() == 0.0 {
            return Err(MeshError::SingularCell);
        }
        self.matrix.try_inverse().ok_or(MeshError::SingularCell)
    }

    /// Converts an absolute point to reduced cell coordinates.
    pub fn absolute_to_reduced(&self, p: &Point3<f64>) -> Result<Point3<f64>> {
        Ok(Point3::from(self.inverse()? * (p - self.origin)))
    }

    /// Converts a point in reduced cell coordinates to absolute coordinates.
    pub fn reduced_to_absolute(&self, p: &Point3<f64>) -> Point3<f64> {
        self.origin + self.matrix * p.coords
    }

    /// Wraps a vector using the minimum image convention along the periodic axes.
    pub fn wrap_vector(&self, v: &Vector3<f64>) -> Result<Vector3<f64>> {
        Ok(self.wrap_vector_with(&self.inverse()?, v))
    }

    /// Like [`Self::wrap_vector`], with the inverse matrix computed by the caller.
    ///
    /// `inverse` must be the result of [`Self::inverse`] for this cell.
    pub fn wrap_vector_with(&self, inverse: &Matrix3<f64>, v: &Vector3<f64>) -> Vector3<f64> {
        let reduced = inverse * v;
        let mut out = *v;
        for dim in (0..3).filter(|&dim| self.has_pbc(dim)) {
            let shift = round_half_up(reduced[dim]);
            if shift != 0.0 {
                out -= shift * self.cell_vector(dim);
            }
        }
        out
    }

    /// Maps a point back into the primary cell along the periodic axes.
    pub fn wrap_point(&self, p: &Point3<f64>) -> Result<Point3<f64>> {
        let reduced = self.absolute_to_reduced(p)?;
        let mut out = *p;
        for dim in (0..3).filter(|&dim| self.has_pbc(dim)) {
            let shift = reduced[dim].floor();
            if shift != 0.0 {
                out -= shift * self.cell_vector(dim);
            }
        }
        Ok(out)
    }

    /// Returns the lattice translation of periodic image `image`.
    pub fn image_translation(&self, image: [i32; 3]) -> Vector3<f64> {
        self.matrix * Vector3::new(image[0] as f64, image[1] as f64, image[2] as f64)
    }

    /// Returns the cell that covers every image in `range`.
    ///
    /// The origin moves by the lower image corner and each cell vector is
    /// scaled by the number of images along its axis.
    pub fn extended(&self, range: &ImageRange) -> SimulationCell {
        let mut cell = *self;
        cell.origin += self.image_translation(range.min);
        for dim in 0..3 {
            let scale = range.extent(dim) as f64;
            cell.matrix.column_mut(dim).scale_mut(scale);
        }
        cell
    }

    /// Computes `k mod n` with a result in `0..n`, also for negative `k`.
    #[inline]
    pub fn modulo(k: i64, n: usize) -> usize {
        k.rem_euclid(n as i64) as usize
    }
}

/// Minimum-image rounding: `floor(x + 0.5)`.
#[inline]
pub(crate) fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

/// An inclusive box of periodic image indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRange {
    /// Lowest image index along each axis.
    pub min: [i32; 3],
    /// Highest image index along each axis (inclusive).
    pub max: [i32; 3],
}

impl ImageRange {
    /// Creates an image range.
    ///
    /// # Errors
    /// [`MeshError::InvalidParameter`] if `max < min` on any axis.
    pub fn new(min: [i32; 3], max: [i32; 3]) -> Result<Self> {
        if (0..3).any(|dim| max[dim] < min[dim]) {
            return Err(MeshError::invalid_param(
                "image_range",
                format!("{:?}..={:?}", min, max),
                "upper corner must not lie below lower corner",
            ));
        }
        Ok(Self { min, max })
    }

    /// The range `0..=n-1` along each axis.
    pub fn from_counts(num_images: [usize; 3]) -> Self {
        let max = num_images.map(|n| n.max(1) as i32 - 1);
        Self { min: [0; 3], max }
    }

    /// A range of the given extent centred on the primary image.
    ///
    /// Along an axis with `n` images the range is `-(n-1)/2 ..= n/2`.
    pub fn centered(num_images: [usize; 3]) -> Self {
        let n = num_images.map(|n| n.max(1) as i32);
        Self {
            min: n.map(|n| -(n - 1) / 2),
            max: n.map(|n| n / 2),
        }
    }

    /// Number of images along axis `dim`.
    #[inline]
    pub fn extent(&self, dim: usize) -> usize {
        (self.max[dim] - self.min[dim] + 1) as usize
    }

    /// Total number of images in the range.
    pub fn count(&self) -> usize {
        (0..3).map(|dim| self.extent(dim)).product()
    }

    /// Iterate over all images, x slowest and z fastest.
    pub fn images(&self) -> impl Iterator<Item = [i32; 3]> + '_ {
        let [x0, y0, z0] = self.min;
        let [x1, y1, z1] = self.max;
        (x0..=x1).flat_map(move |x| (y0..=y1).flat_map(move |y| (z0..=z1).map(move |z| [x, y, z])))
    }
}
