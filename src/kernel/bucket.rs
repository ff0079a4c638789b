/*
 * @Author       : 老董
 * @Date         : 2026-03-04
 * @Description  : 按元素总数选择核函数尺寸档位（小/中/大），并计算线程组数量。
 *                 档位按`total / MAX_THREAD_GROUPS`（向下取整）选取，因此实际的线程组数量
 *                 可能略多于`MAX_THREAD_GROUPS`，最多约为其`33/32`倍。
 */

use super::KernelError;

/// 选择档位时的基准线程组数量（并非实际线程组数量的硬上限）
pub const MAX_THREAD_GROUPS: usize = 65000;

/// 最大档位下单次调度能处理的元素总数上限
pub const MAX_ELEMENTS_PER_DISPATCH: usize = MAX_THREAD_GROUPS * (SizeBucket::Large.threads() + 1) - 1;

/// 核函数的尺寸档位，对应名称后缀`_8`、`_16`、`_32`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SizeBucket {
    Small,
    Medium,
    Large,
}

impl SizeBucket {
    /// 每个线程组在x轴上的线程数
    pub const fn threads(&self) -> usize {
        match self {
            SizeBucket::Small => 8,
            SizeBucket::Medium => 16,
            SizeBucket::Large => 32,
        }
    }

    /// 在`[小, 中, 大]`三元组中的位置
    pub const fn index(&self) -> usize {
        match self {
            SizeBucket::Small => 0,
            SizeBucket::Medium => 1,
            SizeBucket::Large => 2,
        }
    }

    /// 如`kernel_name("PoolingOperation")`得到`PoolingOperation_16`
    pub fn kernel_name(&self, family: &str) -> String {
        format!("{family}_{}", self.threads())
    }
}

/// 一次调度在x轴上的线程组划分
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadGroups {
    pub bucket: SizeBucket,
    /// 每个线程组负责的元素数
    pub per_group: usize,
    /// x轴上的线程组数量
    pub groups: usize,
}

impl ThreadGroups {
    /// 根据元素总数选择档位：
    /// - 不超过`MAX_THREAD_GROUPS`时使用小档位，每组1个元素；
    /// - 否则按`total / MAX_THREAD_GROUPS`落入8、16、32三档之一，
    ///   此时`groups = ceil(total / 档位线程数)`，可能超过`MAX_THREAD_GROUPS`；
    /// - 超过32档则返回`KernelError::Capacity`。
    pub fn for_elements(total: usize) -> Result<Self, KernelError> {
        let mut per_group = (total / MAX_THREAD_GROUPS).max(1);
        let mut bucket = SizeBucket::Small;
        if total > MAX_THREAD_GROUPS {
            bucket = match per_group {
                0..=8 => SizeBucket::Small,
                9..=16 => SizeBucket::Medium,
                17..=32 => SizeBucket::Large,
                _ => {
                    return Err(KernelError::Capacity {
                        elements: total,
                        max: MAX_ELEMENTS_PER_DISPATCH,
                    });
                }
            };
            per_group = bucket.threads();
        }
        Ok(Self {
            bucket,
            per_group,
            groups: total.div_ceil(per_group),
        })
    }
}
