//! Forest-loss composition helpers.
//!
//! Builds the expression graphs the silva pipeline sends to the imagery
//! service: yearly loss rasters from the Hansen global forest-change
//! dataset, before/after collection windows, and the stacked difference
//! image used as segmentation training data.

use crate::expression::{Image, ImageCollection};

/// Hansen global forest-change asset.
pub const HANSEN_ASSET: &str = "UMD/hansen/global_forest_change_2021_v1_9";

/// Harmonized Sentinel-2 surface-reflectance collection.
pub const SENTINEL2_ASSET: &str = "COPERNICUS/S2_SR_HARMONIZED";

/// The Hansen dataset's year origin: `lossyear` stores `year - 2000`.
const HANSEN_YEAR_ORIGIN: i64 = 2000;

/// Builds the loss raster for one year.
///
/// The result has a single band with values 0 = no loss, 1 = loss in
/// `year`, 2 = loss in another year.
pub fn hansen_loss_image(year: i32) -> Image {
    let offset = Image::constant(i64::from(year) - HANSEN_YEAR_ORIGIN);
    let zero = Image::constant(0);

    let hansen = Image::asset(HANSEN_ASSET).select(&["lossyear"]).unmask(0);

    let loss_in_year = hansen.eq(&offset);
    let loss_in_other_year = hansen
        .neq(&offset)
        .and(&hansen.neq(&zero))
        .multiply(&Image::constant(2));

    loss_in_year.add(&loss_in_other_year)
}

/// Splits a collection into the year-before and year-after windows
/// around `year`: `[year-1, year)` and `[year+1, year+2)`.
pub fn before_after_collections(
    collection: &ImageCollection,
    year: i32,
) -> (ImageCollection, ImageCollection) {
    let before = collection.filter_date(&(year - 1).to_string(), &year.to_string());
    let after = collection.filter_date(&(year + 1).to_string(), &(year + 2).to_string());
    (before, after)
}

/// Stacks before/after change bands with the loss band.
///
/// The result has `2n + 1` bands for `n` change bands: the change bands
/// prefixed `before_` and `after_`, then a final `loss` band taken from
/// the Hansen image, all cast to float.
pub fn difference_image(
    before: &Image,
    after: &Image,
    hansen: &Image,
    change_bands: &[&str],
) -> Image {
    let before_names: Vec<String> = change_bands
        .iter()
        .map(|band| format!("before_{band}"))
        .collect();
    let after_names: Vec<String> = change_bands
        .iter()
        .map(|band| format!("after_{band}"))
        .collect();
    let before_refs: Vec<&str> = before_names.iter().map(String::as_str).collect();
    let after_refs: Vec<&str> = after_names.iter().map(String::as_str).collect();

    let before = before.select_renamed(change_bands, &before_refs);
    let after = after.select_renamed(change_bands, &after_refs);

    before
        .add_bands(&after)
        .add_bands_renamed(hansen, &["loss"])
        .to_float()
}

/// Masks clouds and cirrus in Sentinel-2 imagery using the QA60 band
/// (bits 10 and 11), then rescales reflectance to `[0, 1]`.
pub fn mask_sentinel2_clouds(collection: &ImageCollection) -> ImageCollection {
    collection.map(|image| {
        let qa = image.select(&["QA60"]);
        let zero = Image::constant(0);

        let cloud_free = qa.bitwise_and(&Image::constant(1 << 10)).eq(&zero);
        let cirrus_free = qa.bitwise_and(&Image::constant(1 << 11)).eq(&zero);
        let mask = cloud_free.and(&cirrus_free);

        image.update_mask(&mask).divide(&Image::constant(10_000))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_json(image: &Image) -> serde_json::Value {
        serde_json::to_value(image.expr()).unwrap()
    }

    #[test]
    fn test_loss_image_offsets_year() {
        let json = serde_json::to_string(&hansen_loss_image(2019).expr()).unwrap();
        // 2019 is encoded as 19 in the lossyear band.
        assert!(json.contains(r#""constantValue":19"#));
        assert!(json.contains(HANSEN_ASSET));
        assert!(json.contains("Image.unmask"));
    }

    #[test]
    fn test_loss_image_doubles_other_years() {
        let json = serde_json::to_string(&hansen_loss_image(2019).expr()).unwrap();
        assert!(json.contains("Image.neq"));
        assert!(json.contains("Image.multiply"));
        assert!(json.contains(r#""constantValue":2"#));
    }

    #[test]
    fn test_before_after_windows() {
        let collection = ImageCollection::asset(SENTINEL2_ASSET);
        let (before, after) = before_after_collections(&collection, 2019);

        let before_json = serde_json::to_string(before.expr()).unwrap();
        assert!(before_json.contains(r#""constantValue":"2018""#));
        assert!(before_json.contains(r#""constantValue":"2019""#));

        let after_json = serde_json::to_string(after.expr()).unwrap();
        assert!(after_json.contains(r#""constantValue":"2020""#));
        assert!(after_json.contains(r#""constantValue":"2021""#));
    }

    #[test]
    fn test_difference_image_band_names() {
        let before = Image::asset("before");
        let after = Image::asset("after");
        let hansen = hansen_loss_image(2019);

        let diff = difference_image(&before, &after, &hansen, &["B4", "B3", "B2"]);
        let json = serde_json::to_string(diff.expr()).unwrap();

        for band in ["before_B4", "before_B3", "before_B2", "after_B4", "after_B3", "after_B2"] {
            assert!(json.contains(band), "missing band {band}");
        }
        assert!(json.contains(r#"["loss"]"#));
        assert!(json.contains("Image.float"));
    }

    #[test]
    fn test_cloud_mask_checks_qa_bits() {
        let masked = mask_sentinel2_clouds(&ImageCollection::asset(SENTINEL2_ASSET));
        let json = serde_json::to_string(masked.expr()).unwrap();

        assert!(json.contains("QA60"));
        assert!(json.contains(&(1 << 10).to_string()));
        assert!(json.contains(&(1 << 11).to_string()));
        assert!(json.contains("Image.bitwiseAnd"));
        assert!(json.contains("Image.updateMask"));
        assert!(json.contains(r#""constantValue":10000"#));
    }

    #[test]
    fn test_loss_values_structure() {
        // The top of the graph is the add combining the two loss terms.
        let json = to_json(&hansen_loss_image(2021));
        assert_eq!(json["functionInvocationValue"]["functionName"], "Image.add");
    }
}
