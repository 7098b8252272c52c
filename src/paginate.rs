/// One sheet of a thumbnail grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailPage<T> {
    pub items: Vec<T>,
    pub columns: usize,
}

/// How rendered pages are laid out for display.
#[derive(Debug, Clone, PartialEq)]
pub enum GridLayout<T> {
    /// One page per sheet: a single full-size viewer, no batching.
    FullSize(Vec<T>),
    Grid(Vec<ThumbnailPage<T>>),
}

/// Grid columns for `per_page` items per sheet: 2 for four-up, otherwise the
/// smallest square that holds them.
pub fn columns_for(per_page: usize) -> usize {
    if per_page == 4 {
        return 2;
    }
    let mut columns = 1;
    while columns * columns < per_page {
        columns += 1;
    }
    columns
}

/// Split `items` into consecutive sheets of `per_page`; the last may be
/// shorter. Every sheet uses the column count of the configured size.
pub fn paginate<T: Clone>(items: &[T], per_page: usize) -> Vec<ThumbnailPage<T>> {
    let per_page = per_page.max(1);
    let columns = columns_for(per_page);
    items
        .chunks(per_page)
        .map(|chunk| ThumbnailPage {
            items: chunk.to_vec(),
            columns,
        })
        .collect()
}

/// Lay `items` out for `per_page` slides per sheet. A size of 1 bypasses
/// pagination entirely.
pub fn layout<T: Clone>(items: &[T], per_page: usize) -> GridLayout<T> {
    if per_page <= 1 {
        GridLayout::FullSize(items.to_vec())
    } else {
        GridLayout::Grid(paginate(items, per_page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn nine_pages_four_up() {
        let pages: Vec<u32> = (1..=9).collect();
        let sheets = paginate(&pages, 4);

        let sizes: Vec<usize> = sheets.iter().map(|s| s.items.len()).collect();
        assert_eq!(sizes, vec![4, 4, 1]);
        assert!(sheets.iter().all(|s| s.columns == 2));
        assert_eq!(sheets[2].items, vec![9]);
    }

    #[test]
    fn column_counts() {
        assert_eq!(columns_for(1), 1);
        assert_eq!(columns_for(2), 2);
        assert_eq!(columns_for(3), 2);
        assert_eq!(columns_for(4), 2);
        assert_eq!(columns_for(6), 3);
        assert_eq!(columns_for(9), 3);
        assert_eq!(columns_for(10), 4);
        assert_eq!(columns_for(16), 4);
    }

    #[test]
    fn single_slide_per_page_bypasses_pagination() {
        let pages = vec!["a", "b", "c"];
        assert_eq!(layout(&pages, 1), GridLayout::FullSize(pages.clone()));
    }

    #[test]
    fn grid_layout_for_larger_batches() {
        let pages: Vec<u32> = (1..=7).collect();
        let GridLayout::Grid(sheets) = layout(&pages, 6) else {
            panic!("expected a grid");
        };
        assert_eq!(sheets.len(), 2);
        assert_eq!(sheets[0].columns, 3);
        assert_eq!(sheets[1].items, vec![7]);
    }

    #[test]
    fn empty_input_has_no_sheets() {
        assert!(paginate::<u32>(&[], 4).is_empty());
    }
}
