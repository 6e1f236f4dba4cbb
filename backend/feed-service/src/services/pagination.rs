use crate::models::PageRequest;

/// Returns the slice `[(page-1)*size, page*size)` clipped to `items`.
/// Past the end yields an empty slice.
pub fn paginate<T>(items: &[T], page: PageRequest) -> &[T] {
    let start = page.offset().min(items.len());
    let end = start.saturating_add(page.page_size()).min(items.len());
    &items[start..end]
}
