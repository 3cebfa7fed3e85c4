//! Author detection for search results
//!
//! Decides whether a free-text query most likely named an author rather
//! than a title. Rule: with at least two results, the most frequent author
//! (trimmed, case-insensitive) must appear in at least half of them,
//! rounded up. Ties go to the author seen first.

use safereads_common::models::{Book, UNKNOWN_AUTHOR};
use serde::Serialize;

const MAX_TOP_BOOKS: usize = 4;
const MAX_CATEGORIES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorMatch {
    /// Display form, as written in the first matching result
    pub name: String,
    pub book_count: usize,
    pub top_books: Vec<AuthorBook>,
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorBook {
    pub title: String,
    pub cover_url: Option<String>,
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

pub fn detect_author(books: &[Book]) -> Option<AuthorMatch> {
    if books.len() < 2 {
        return None;
    }

    let unknown = normalize(UNKNOWN_AUTHOR);

    // (normalized, display, count) in first-seen order
    let mut tallies: Vec<(String, String, usize)> = Vec::new();
    for book in books {
        let mut seen_in_book: Vec<String> = Vec::new();
        for author in &book.authors {
            let key = normalize(author);
            if key.is_empty() || key == unknown || seen_in_book.contains(&key) {
                continue;
            }
            match tallies.iter_mut().find(|(k, _, _)| *k == key) {
                Some(entry) => entry.2 += 1,
                None => tallies.push((key.clone(), author.trim().to_string(), 1)),
            }
            seen_in_book.push(key);
        }
    }

    // First maximum wins
    let mut best: Option<&(String, String, usize)> = None;
    for tally in &tallies {
        if best.map_or(true, |b| tally.2 > b.2) {
            best = Some(tally);
        }
    }
    let (key, display, count) = best?;

    let threshold = books.len().div_ceil(2);
    if *count < threshold {
        return None;
    }

    let by_author: Vec<&Book> = books
        .iter()
        .filter(|book| book.authors.iter().any(|a| normalize(a) == *key))
        .collect();

    let top_books = by_author
        .iter()
        .take(MAX_TOP_BOOKS)
        .map(|book| AuthorBook {
            title: book.title.clone(),
            cover_url: book.cover_url.clone(),
        })
        .collect();

    let mut categories: Vec<String> = Vec::new();
    for category in by_author
        .iter()
        .filter_map(|book| book.categories.as_ref())
        .flatten()
    {
        if categories.len() == MAX_CATEGORIES {
            break;
        }
        if !categories.contains(category) {
            categories.push(category.clone());
        }
    }

    Some(AuthorMatch {
        name: display.clone(),
        book_count: *count,
        top_books,
        categories,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn book(title: &str, authors: &[&str], categories: &[&str]) -> Book {
        Book {
            id: Uuid::new_v4(),
            google_books_id: None,
            open_library_key: None,
            title: title.to_string(),
            authors: authors.iter().map(|a| a.to_string()).collect(),
            description: None,
            cover_url: Some(format!("https://covers.example/{}.jpg", title)),
            page_count: None,
            published_date: None,
            categories: Some(categories.iter().map(|c| c.to_string()).collect()),
            isbn10: None,
            isbn13: None,
            maturity_rating: None,
            average_rating: None,
            ratings_count: None,
        }
    }

    #[test]
    fn test_majority_author_detected() {
        let books = vec![
            book("Matilda", &["Roald Dahl"], &["Fiction"]),
            book("The BFG", &["roald dahl "], &["Fiction", "Fantasy"]),
            book("Dahl: A Life", &["Jeremy Treglown"], &["Biography"]),
            book("Boy", &["Roald Dahl"], &["Memoir"]),
        ];

        let found = detect_author(&books).unwrap();
        assert_eq!(found.name, "Roald Dahl");
        assert_eq!(found.book_count, 3);
        assert_eq!(found.top_books.len(), 3);
        assert_eq!(found.top_books[1].title, "The BFG");
        assert_eq!(found.categories, vec!["Fiction", "Fantasy", "Memoir"]);
    }

    #[test]
    fn test_exactly_half_counts() {
        let books = vec![
            book("A", &["Writer One"], &[]),
            book("B", &["Writer Two"], &[]),
            book("C", &["Writer One"], &[]),
            book("D", &["Writer Three"], &[]),
        ];
        assert_eq!(detect_author(&books).unwrap().name, "Writer One");
    }

    #[test]
    fn test_no_majority_or_too_few_results() {
        let scattered = vec![
            book("A", &["One"], &[]),
            book("B", &["Two"], &[]),
            book("C", &["Three"], &[]),
        ];
        assert!(detect_author(&scattered).is_none());

        let single = vec![book("A", &["One"], &[])];
        assert!(detect_author(&single).is_none());
    }

    #[test]
    fn test_tie_goes_to_first_seen() {
        let books = vec![
            book("A", &["Second Seen", "First Seen"], &[]),
            book("B", &["First Seen", "Second Seen"], &[]),
        ];
        assert_eq!(detect_author(&books).unwrap().name, "Second Seen");
    }

    #[test]
    fn test_unknown_author_placeholder_ignored() {
        let books = vec![
            book("A", &[UNKNOWN_AUTHOR], &[]),
            book("B", &[UNKNOWN_AUTHOR], &[]),
        ];
        assert!(detect_author(&books).is_none());
    }

    #[test]
    fn test_top_books_and_categories_capped() {
        let books: Vec<Book> = (0..8)
            .map(|i| {
                let title = format!("Book {}", i);
                let category = format!("Cat {}", i);
                book(&title, &["Prolific"], &[category.as_str()])
            })
            .collect();

        let found = detect_author(&books).unwrap();
        assert_eq!(found.book_count, 8);
        assert_eq!(found.top_books.len(), 4);
        assert_eq!(found.categories.len(), 5);
    }
}
