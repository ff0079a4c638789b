use std::ops::{Add, AddAssign, Sub, SubAssign};

use super::Matrix;
use crate::errors::{MatrixError, Operator};

fn assert_same_shape(a: &Matrix, b: &Matrix, operator: Operator) {
    assert!(
        a.is_same_shape(b),
        "{}",
        MatrixError::OperatorError {
            operator,
            matrix1_shape: a.shape(),
            matrix2_shape: b.shape(),
        }
    );
}

/*↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓加减（含自加减）↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓*/
impl<'a> Add<&'a Matrix> for &'a Matrix {
    type Output = Matrix;

    fn add(self, other: &'a Matrix) -> Matrix {
        assert_same_shape(self, other, Operator::Add);
        Matrix::from_array(&self.data + &other.data)
    }
}

impl<'a> Sub<&'a Matrix> for &'a Matrix {
    type Output = Matrix;

    fn sub(self, other: &'a Matrix) -> Matrix {
        assert_same_shape(self, other, Operator::Sub);
        Matrix::from_array(&self.data - &other.data)
    }
}

impl AddAssign<&Matrix> for Matrix {
    fn add_assign(&mut self, other: &Matrix) {
        assert_same_shape(self, other, Operator::AddAssign);
        self.data += &other.data;
    }
}

impl SubAssign<&Matrix> for Matrix {
    fn sub_assign(&mut self, other: &Matrix) {
        assert_same_shape(self, other, Operator::SubAssign);
        self.data -= &other.data;
    }
}
/*↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑加减（含自加减）↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑*/

impl Matrix {
    /// 矩阵乘法。需要保证前一个矩阵的列数等于后一个矩阵的行数，否则会panic
    pub fn mat_mul(&self, other: &Matrix) -> Matrix {
        assert!(
            self.cols() == other.rows(),
            "{}",
            MatrixError::OperatorError {
                operator: Operator::MatMul,
                matrix1_shape: self.shape(),
                matrix2_shape: other.shape(),
            }
        );
        Matrix::from_array(self.data.dot(&other.data))
    }

    /// 逐元素相乘（⊙）
    pub fn hadamard(&self, other: &Matrix) -> Matrix {
        assert_same_shape(self, other, Operator::Hadamard);
        Matrix::from_array(&self.data * &other.data)
    }

    pub fn transpose(&self) -> Matrix {
        Matrix::from_array(self.data.t().as_standard_layout().into_owned())
    }

    /// 每个元素乘以`factor`
    pub fn scale(&self, factor: f32) -> Matrix {
        Matrix::from_array(self.data.mapv(|x| x * factor))
    }

    /// 对每个元素应用`f`
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Matrix {
        Matrix::from_array(self.data.mapv(f))
    }

    /// 按行优先顺序重新解释为`rows`行`cols`列，元素总数须一致
    pub fn reshape(&self, rows: usize, cols: usize) -> Matrix {
        assert!(
            self.len() == rows * cols,
            "{}",
            MatrixError::IncompatibleReshape {
                from: self.shape(),
                to: [rows, cols],
            }
        );
        Matrix::new(self.as_slice(), rows, cols)
    }

    /// 逐元素复制`other`的值（按行优先顺序），二者元素总数须一致，形状可不同
    pub fn copy_from(&mut self, other: &Matrix) {
        assert!(
            self.len() == other.len(),
            "{}",
            MatrixError::OperatorError {
                operator: Operator::Copy,
                matrix1_shape: self.shape(),
                matrix2_shape: other.shape(),
            }
        );
        self.as_slice_mut().copy_from_slice(other.as_slice());
    }

    /// `self -= other * factor`，参数更新用
    pub fn scaled_sub_assign(&mut self, other: &Matrix, factor: f32) {
        assert_same_shape(self, other, Operator::SubAssign);
        self.data.scaled_add(-factor, &other.data);
    }
}
