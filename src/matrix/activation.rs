use serde::{Deserialize, Serialize};

use super::Matrix;

/// 逐元素激活函数。未指定时默认为`Tanh`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Activation {
    #[default]
    Tanh,
    Sigmoid,
    ReLU,
    /// 恒等映射，不做任何变换
    Identity,
}

impl Activation {
    pub fn apply(self, x: f32) -> f32 {
        match self {
            Activation::Tanh => x.tanh(),
            // 等价于 e^x / (e^x + 1)
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::ReLU => x.max(0.0),
            Activation::Identity => x,
        }
    }

    /// 激活函数在`x`（激活前的值）处的导数
    pub fn derivative(self, x: f32) -> f32 {
        match self {
            Activation::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
            // 等价于 e^x / (e^x + 1)^2
            Activation::Sigmoid => {
                let s = Activation::Sigmoid.apply(x);
                s * (1.0 - s)
            }
            Activation::ReLU => {
                if x < 0.0 {
                    0.0
                } else {
                    1.0
                }
            }
            Activation::Identity => 1.0,
        }
    }
}

impl Matrix {
    pub fn activate(&self, activation: Activation) -> Matrix {
        self.map(|x| activation.apply(x))
    }

    pub fn activate_derivative(&self, activation: Activation) -> Matrix {
        self.map(|x| activation.derivative(x))
    }
}
