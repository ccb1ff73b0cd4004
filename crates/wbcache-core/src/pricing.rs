//! Seller-price and SPP arithmetic shared by the site-data stage.
//!
//! SPP ("скидка постоянного покупателя") is the marketplace-funded discount
//! that sits between the seller's discounted price and the live site price.

/// Seller price after the seller's own discount, rounded to whole roubles.
///
/// Returns `None` when either input is missing or the price is not positive.
#[must_use]
pub fn discounted_price(supplier_price: Option<f64>, supplier_discount: Option<f64>) -> Option<f64> {
    let price = supplier_price.filter(|p| *p > 0.0)?;
    let discount = supplier_discount?;
    Some((price * (1.0 - discount / 100.0)).round())
}

/// SPP percentage for a size, clamped to `[0, 100]`.
///
/// Falls back to `previous` whenever the site price or the discounted seller
/// price is missing or non-positive, so a transient zero from the site never
/// overwrites a known value.
#[must_use]
pub fn site_spp(
    site_price: Option<f64>,
    supplier_discounted_price: Option<f64>,
    previous: Option<f64>,
) -> Option<f64> {
    match (site_price, supplier_discounted_price) {
        (Some(site), Some(discounted)) if site > 0.0 && discounted > 0.0 => {
            let spp = ((1.0 - site / discounted) * 100.0).round();
            Some(spp.clamp(0.0, 100.0))
        }
        _ => previous,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discounted_price_applies_percentage() {
        assert_eq!(discounted_price(Some(1000.0), Some(50.0)), Some(500.0));
        assert_eq!(discounted_price(Some(999.0), Some(33.0)), Some(669.0));
    }

    #[test]
    fn discounted_price_requires_both_inputs() {
        assert_eq!(discounted_price(None, Some(10.0)), None);
        assert_eq!(discounted_price(Some(100.0), None), None);
        assert_eq!(discounted_price(Some(0.0), Some(10.0)), None);
    }

    #[test]
    fn spp_is_zero_when_site_matches_discounted_price() {
        let discounted = discounted_price(Some(1000.0), Some(50.0));
        assert_eq!(site_spp(Some(500.0), discounted, Some(12.0)), Some(0.0));
    }

    #[test]
    fn spp_rounds_to_whole_percent() {
        assert_eq!(site_spp(Some(425.0), Some(500.0), None), Some(15.0));
        assert_eq!(site_spp(Some(333.0), Some(1000.0), None), Some(67.0));
    }

    #[test]
    fn spp_keeps_previous_value_on_zero_site_price() {
        assert_eq!(site_spp(Some(0.0), Some(500.0), Some(17.0)), Some(17.0));
        assert_eq!(site_spp(None, Some(500.0), Some(17.0)), Some(17.0));
        assert_eq!(site_spp(Some(450.0), None, None), None);
    }

    #[test]
    fn spp_is_clamped() {
        // Site price above the seller's discounted price would be negative.
        assert_eq!(site_spp(Some(600.0), Some(500.0), None), Some(0.0));
    }
}
