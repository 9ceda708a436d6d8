//! Month-folder selection under a base folder.

use crate::remote::DriveItem;

/// Folders in `children` whose names appear in `months`, returned in the
/// order of `months` (not listing order). Names compare case-insensitively;
/// configured months without a folder are skipped.
pub fn select_months(children: &[DriveItem], months: &[String]) -> Vec<DriveItem> {
    months
        .iter()
        .filter_map(|m| {
            let wanted = m.trim().to_lowercase();
            children
                .iter()
                .find(|c| c.is_folder() && c.name.trim().to_lowercase() == wanted)
                .cloned()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_configured_order_and_skips_absent() {
        let children = vec![
            DriveItem::folder("3", "MARZO"),
            DriveItem::folder("1", "enero"),
            DriveItem::folder("x", "OTROS"),
            DriveItem::file("f", "FEBRERO", 1),
        ];
        let months: Vec<String> = ["ENERO", "FEBRERO", "MARZO"].map(String::from).to_vec();
        let picked: Vec<String> = select_months(&children, &months)
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(picked, vec!["enero", "MARZO"]);
    }
}
