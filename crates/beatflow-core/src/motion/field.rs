use ndarray::{Array3, Array4, ArrayView2, ArrayView3, Axis};

/// Displacement vectors per frame pair, shape `(pairs, 2, rows, cols)`.
///
/// Component 0 is x (along columns), component 1 is y (along rows).
/// NaN marks a block without data.
#[derive(Clone, Debug, PartialEq)]
pub struct VectorField {
    pub data: Array4<f32>,
}

impl VectorField {
    pub fn new(data: Array4<f32>) -> Self {
        assert_eq!(data.dim().1, 2, "vector fields carry two components");
        Self { data }
    }

    pub fn zeros(pairs: usize, rows: usize, cols: usize) -> Self {
        Self::new(Array4::zeros((pairs, 2, rows, cols)))
    }

    /// Number of frame pairs.
    pub fn len(&self) -> usize {
        self.data.dim().0
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Block grid shape as (rows, cols).
    pub fn grid_dim(&self) -> (usize, usize) {
        let (_, _, rows, cols) = self.data.dim();
        (rows, cols)
    }

    /// All x components, shape `(pairs, rows, cols)`.
    pub fn x(&self) -> ArrayView3<'_, f32> {
        self.data.index_axis(Axis(1), 0)
    }

    /// All y components, shape `(pairs, rows, cols)`.
    pub fn y(&self) -> ArrayView3<'_, f32> {
        self.data.index_axis(Axis(1), 1)
    }

    /// The `(x, y)` vector of one block.
    pub fn vector(&self, pair: usize, row: usize, col: usize) -> (f32, f32) {
        (
            self.data[[pair, 0, row, col]],
            self.data[[pair, 1, row, col]],
        )
    }
}

/// Non-negative magnitudes per frame pair, shape `(pairs, rows, cols)`.
#[derive(Clone, Debug, PartialEq)]
pub struct ScalarField {
    pub data: Array3<f32>,
}

impl ScalarField {
    pub fn new(data: Array3<f32>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.dim().0
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn grid_dim(&self) -> (usize, usize) {
        let (_, rows, cols) = self.data.dim();
        (rows, cols)
    }

    pub fn frame(&self, pair: usize) -> ArrayView2<'_, f32> {
        self.data.index_axis(Axis(0), pair)
    }
}
