use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::WheelError;

/// 权重为百分比，合法的奖品表权重和为 100
pub const FULL_WEIGHT: f64 = 100.0;

const WEIGHT_TOLERANCE: f64 = 1e-6;

/// 转盘上的一个奖品（一个扇区）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Prize {
    pub id: i64,
    pub name: String,
    /// 权重 (百分比 0..=100)
    pub weight: f64,
    /// 优惠码 (None / 空串 表示无优惠券，例如 "再来一次")
    pub coupon_code: Option<String>,
}

impl Prize {
    pub fn coupon(&self) -> Option<&str> {
        self.coupon_code.as_deref().filter(|c| !c.trim().is_empty())
    }
}

/// 有序、非空的奖品列表，转盘第 `i` 个扇区即 `prizes[i]`
#[derive(Debug, Clone, PartialEq)]
pub struct PrizeTable {
    prizes: Vec<Prize>,
}

impl PrizeTable {
    pub fn new(prizes: Vec<Prize>) -> Result<Self, WheelError> {
        if prizes.is_empty() {
            return Err(WheelError::EmptyPrizeTable);
        }
        for p in &prizes {
            if !p.weight.is_finite() || p.weight < 0.0 || p.weight > FULL_WEIGHT {
                return Err(WheelError::InvalidWeight {
                    name: p.name.clone(),
                    weight: p.weight,
                });
            }
        }
        let table = Self { prizes };
        if table.total_weight() <= 0.0 {
            return Err(WheelError::ZeroTotalWeight);
        }
        Ok(table)
    }

    pub fn prizes(&self) -> &[Prize] {
        &self.prizes
    }

    pub fn get(&self, index: usize) -> Option<&Prize> {
        self.prizes.get(index)
    }

    pub fn len(&self) -> usize {
        self.prizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prizes.is_empty()
    }

    pub fn total_weight(&self) -> f64 {
        self.prizes.iter().map(|p| p.weight).sum()
    }

    pub fn is_balanced(&self) -> bool {
        (self.total_weight() - FULL_WEIGHT).abs() <= WEIGHT_TOLERANCE
    }

    /// 配置校验：权重和必须为 100
    pub fn validate_total(&self) -> Result<(), WheelError> {
        if self.is_balanced() {
            Ok(())
        } else {
            Err(WheelError::UnbalancedWeights {
                total: self.total_weight(),
            })
        }
    }
}

#[cfg(test)]
pub(crate) fn prize(id: i64, name: &str, weight: f64, coupon: Option<&str>) -> Prize {
    Prize {
        id,
        name: name.to_string(),
        weight,
        coupon_code: coupon.map(str::to_string),
    }
}

#[cfg(test)]
pub(crate) fn sample_table() -> PrizeTable {
    PrizeTable::new(vec![
        prize(1, "10% OFF", 30.0, Some("SPIN10")),
        prize(2, "Free Shipping", 20.0, Some("SHIPFREE")),
        prize(3, "20% OFF", 15.0, Some("SPIN20")),
        prize(4, "Try Again", 35.0, None),
    ])
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_table_rejected() {
        assert_eq!(PrizeTable::new(vec![]), Err(WheelError::EmptyPrizeTable));
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let negative = PrizeTable::new(vec![prize(1, "a", -1.0, None)]);
        assert!(matches!(negative, Err(WheelError::InvalidWeight { .. })));

        let nan = PrizeTable::new(vec![prize(1, "a", f64::NAN, None)]);
        assert!(matches!(nan, Err(WheelError::InvalidWeight { .. })));

        let zero = PrizeTable::new(vec![prize(1, "a", 0.0, None), prize(2, "b", 0.0, None)]);
        assert_eq!(zero, Err(WheelError::ZeroTotalWeight));
    }

    #[test]
    fn test_validate_total() {
        assert!(sample_table().validate_total().is_ok());

        let short = PrizeTable::new(vec![prize(1, "a", 40.0, None), prize(2, "b", 50.0, None)])
            .unwrap();
        assert!(!short.is_balanced());
        assert_eq!(
            short.validate_total(),
            Err(WheelError::UnbalancedWeights { total: 90.0 })
        );
    }

    #[test]
    fn test_fractional_weights_balance() {
        let table = PrizeTable::new(vec![
            prize(1, "a", 33.3, None),
            prize(2, "b", 33.3, None),
            prize(3, "c", 33.4, None),
        ])
        .unwrap();
        assert!(table.validate_total().is_ok());
    }

    #[test]
    fn test_blank_coupon_is_no_coupon() {
        assert_eq!(prize(1, "a", 1.0, Some("  ")).coupon(), None);
        assert_eq!(prize(1, "a", 1.0, Some("X1")).coupon(), Some("X1"));
    }
}
