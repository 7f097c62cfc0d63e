use pretty_assertions::assert_eq;
use proptest::prelude::*;

use crate::{
    book::{Book, LoanState},
    catalog::Catalog,
    error::{CatalogError, ErrorKind},
    events::LoanAction,
    observers::{MemoryAuditSink, Operation, Outcome},
};

/// Helper to collect titles for order-sensitive comparisons
fn titles(books: &[&Book]) -> Vec<String> {
    books.iter().map(|book| book.title().to_string()).collect()
}

/// Helper to reduce a history to comparable pairs
fn history_pairs(catalog: &Catalog, username: &str) -> Vec<(String, LoanAction)> {
    catalog
        .get_history(username)
        .map(|events| events.iter().map(|e| (e.title.clone(), e.action)).collect())
        .unwrap_or_default()
}

/// Helper to set up a catalog with one user and a few books
fn setup_test_catalog() -> Catalog {
    let mut catalog = Catalog::new();
    assert_eq!(catalog.add_user("alice"), Ok(()));
    assert_eq!(catalog.add_book("Python Basics", "Alice Author", Some("programming")), Ok(()));
    assert_eq!(catalog.add_book("Dune", "Frank Herbert", Some("scifi")), Ok(()));
    assert_eq!(catalog.add_book("Emma", "Jane Austen", None), Ok(()));
    catalog
}

#[test]
fn test_add_book_starts_available() {
    let catalog = setup_test_catalog();
    assert_eq!(catalog.len(), 3);
    assert!(catalog.book("Dune").is_some_and(Book::is_available));
    assert_eq!(catalog.book("Dune").and_then(Book::category), Some("scifi"));
    assert_eq!(catalog.book("Emma").and_then(Book::category), None);
}

#[test]
fn test_duplicate_title_is_rejected_and_catalog_unchanged() {
    let mut catalog = setup_test_catalog();
    let before = catalog.books().to_vec();

    let result = catalog.add_book("Dune", "Someone Else", Some("fantasy"));

    assert_eq!(result, Err(CatalogError::DuplicateBook("Dune".to_string())));
    assert_eq!(result.map_err(|e| e.kind()), Err(ErrorKind::DuplicateEntity));
    assert_eq!(catalog.books(), before.as_slice());
}

#[test]
fn test_title_identity_is_case_sensitive() {
    let mut catalog = setup_test_catalog();
    assert_eq!(catalog.add_book("dune", "Frank Herbert", None), Ok(()));
    assert_eq!(catalog.len(), 4);
    assert_eq!(
        catalog.remove_book("DUNE").map(|b| b.title().to_string()),
        Err(CatalogError::UnknownBook("DUNE".to_string()))
    );
}

#[test]
fn test_remove_book_twice() {
    let mut catalog = setup_test_catalog();

    let removed = catalog.remove_book("Emma");
    assert_eq!(removed.map(|b| b.author().to_string()), Ok("Jane Austen".to_string()));

    assert_eq!(
        catalog.remove_book("Emma").map(|_| ()),
        Err(CatalogError::UnknownBook("Emma".to_string()))
    );
    assert_eq!(catalog.len(), 2);
}

#[test]
fn test_remove_nonexistent_keeps_size() {
    let mut catalog = setup_test_catalog();
    assert!(catalog.remove_book("Missing").is_err());
    assert_eq!(catalog.len(), 3);
}

#[test]
fn test_search_is_case_insensitive_on_title_and_author() {
    let catalog = setup_test_catalog();
    assert_eq!(titles(&catalog.search_book("python")), vec!["Python Basics"]);
    assert_eq!(titles(&catalog.search_book("ALICE")), vec!["Python Basics"]);
    assert_eq!(titles(&catalog.search_book("herb")), vec!["Dune"]);
    assert!(catalog.search_book("tolkien").is_empty());
}

#[test]
fn test_search_empty_query_returns_all_in_insertion_order() {
    let catalog = setup_test_catalog();
    assert_eq!(titles(&catalog.search_book("")), vec!["Python Basics", "Dune", "Emma"]);
}

#[test]
fn test_search_special_characters() {
    let mut catalog = Catalog::new();
    assert_eq!(catalog.add_book("Book#$%^&*()", "Author", None), Ok(()));
    assert_eq!(titles(&catalog.search_book("#$%")), vec!["Book#$%^&*()"]);
}

#[test]
fn test_search_filtered_combines_filters() {
    let mut catalog = setup_test_catalog();
    assert_eq!(catalog.add_book("Python Cookbook", "David Beazley", Some("Programming")), Ok(()));

    assert_eq!(
        titles(&catalog.search_filtered("python", None, None)),
        vec!["Python Basics", "Python Cookbook"]
    );
    assert_eq!(
        titles(&catalog.search_filtered("python", Some("beaz"), None)),
        vec!["Python Cookbook"]
    );
    assert_eq!(
        titles(&catalog.search_filtered("", None, Some("PROGRAM"))),
        vec!["Python Basics", "Python Cookbook"]
    );
    // books without a category never match a category filter
    assert!(catalog.search_filtered("emma", None, Some("")).is_empty());
}

#[test]
fn test_filter_by_category_is_exact() {
    let catalog = setup_test_catalog();
    assert_eq!(titles(&catalog.filter_by_category("scifi")), vec!["Dune"]);
    assert!(catalog.filter_by_category("SciFi").is_empty());
    assert!(catalog.filter_by_category("mystery").is_empty());
}

#[test]
fn test_user_registry() {
    let mut catalog = setup_test_catalog();
    assert_eq!(catalog.add_user("bob"), Ok(()));
    assert_eq!(catalog.add_user("alice"), Err(CatalogError::DuplicateUser("alice".to_string())));
    assert_eq!(catalog.list_users(), vec!["alice", "bob"]);
}

#[test]
fn test_login_replaces_session_user() {
    let mut catalog = setup_test_catalog();
    assert_eq!(catalog.add_user("bob"), Ok(()));
    assert_eq!(catalog.current_user(), None);

    assert_eq!(catalog.login("alice"), Ok(()));
    assert_eq!(catalog.current_user(), Some("alice"));
    assert_eq!(catalog.login("bob"), Ok(()));
    assert_eq!(catalog.current_user(), Some("bob"));

    assert_eq!(catalog.login("carol"), Err(CatalogError::UnknownUser("carol".to_string())));
    assert_eq!(catalog.current_user(), Some("bob"));

    catalog.logout();
    assert_eq!(catalog.current_user(), None);
}

#[test]
fn test_borrow_return_cycle() {
    let mut catalog = setup_test_catalog();

    let borrowed = catalog.borrow_book("alice", "Dune").map(|b| b.state().clone());
    assert_eq!(borrowed, Ok(LoanState::OnLoan { borrower: "alice".to_string() }));

    let again = catalog.borrow_book("alice", "Dune").map(|_| ());
    assert_eq!(again, Err(CatalogError::AlreadyOnLoan("Dune".to_string())));
    assert_eq!(again.map_err(|e| e.kind()), Err(ErrorKind::InvalidState));

    assert_eq!(catalog.return_book("alice", "Dune").map(Book::is_available), Ok(true));
    assert_eq!(
        catalog.return_book("alice", "Dune").map(|_| ()),
        Err(CatalogError::NotOnLoan("Dune".to_string()))
    );
    assert!(catalog.borrow_book("alice", "Dune").is_ok());
}

#[test]
fn test_borrow_failures_are_distinguishable() {
    let mut catalog = setup_test_catalog();

    assert_eq!(
        catalog.borrow_book("mallory", "Dune").map(|_| ()),
        Err(CatalogError::UnknownUser("mallory".to_string()))
    );
    assert!(catalog.book("Dune").is_some_and(Book::is_available));

    assert_eq!(
        catalog.borrow_book("alice", "Missing").map(|_| ()),
        Err(CatalogError::UnknownBook("Missing".to_string()))
    );
    // unknown user wins when both are unknown
    assert_eq!(
        catalog.borrow_book("mallory", "Missing").map(|_| ()),
        Err(CatalogError::UnknownUser("mallory".to_string()))
    );
    assert!(history_pairs(&catalog, "alice").is_empty());
}

#[test]
fn test_any_user_may_return_a_loaned_book() {
    let mut catalog = setup_test_catalog();
    assert_eq!(catalog.add_user("bob"), Ok(()));
    assert!(catalog.borrow_book("alice", "Dune").is_ok());
    assert_eq!(catalog.book("Dune").and_then(Book::borrower), Some("alice"));

    assert!(catalog.return_book("bob", "Dune").is_ok());
    assert_eq!(catalog.book("Dune").and_then(Book::borrower), None);

    assert_eq!(history_pairs(&catalog, "alice"), vec![("Dune".to_string(), LoanAction::Borrow)]);
    assert_eq!(history_pairs(&catalog, "bob"), vec![("Dune".to_string(), LoanAction::Return)]);
}

#[test]
fn test_history_in_call_order() {
    let mut catalog = setup_test_catalog();
    assert!(catalog.borrow_book("alice", "Dune").is_ok());
    assert!(catalog.borrow_book("alice", "Emma").is_ok());
    assert!(catalog.return_book("alice", "Dune").is_ok());

    assert_eq!(
        history_pairs(&catalog, "alice"),
        vec![
            ("Dune".to_string(), LoanAction::Borrow),
            ("Emma".to_string(), LoanAction::Borrow),
            ("Dune".to_string(), LoanAction::Return),
        ]
    );

    let events = catalog.get_history("alice").unwrap_or_default();
    assert!(events.windows(2).all(|pair| match pair {
        [earlier, later] => earlier.timestamp <= later.timestamp,
        _ => false,
    }));
}

#[test]
fn test_history_of_unknown_user() {
    let catalog = setup_test_catalog();
    assert_eq!(
        catalog.get_history("nobody").map(<[_]>::len),
        Err(CatalogError::UnknownUser("nobody".to_string()))
    );
}

#[test]
fn test_session_loans() {
    let mut catalog = setup_test_catalog();
    assert_eq!(
        catalog.borrow_as_current("Dune").map(|_| ()),
        Err(CatalogError::NoActiveSession)
    );

    assert_eq!(catalog.login("alice"), Ok(()));
    assert!(catalog.borrow_as_current("Dune").is_ok());
    assert!(catalog.return_as_current("Dune").is_ok());
    assert_eq!(
        history_pairs(&catalog, "alice"),
        vec![("Dune".to_string(), LoanAction::Borrow), ("Dune".to_string(), LoanAction::Return)]
    );
}

#[test]
fn test_end_to_end_scenario() {
    let mut catalog = Catalog::new();
    assert_eq!(catalog.add_user("alice"), Ok(()));
    assert_eq!(catalog.login("alice"), Ok(()));
    assert_eq!(catalog.add_book("Dune", "Herbert", Some("scifi")), Ok(()));

    assert!(catalog.borrow_book("alice", "Dune").is_ok());
    assert!(catalog.book("Dune").is_some_and(|b| !b.is_available()));
    assert!(catalog.get_available_books().is_empty());

    assert!(catalog.return_book("alice", "Dune").is_ok());
    assert_eq!(titles(&catalog.get_available_books()), vec!["Dune"]);

    assert_eq!(titles(&catalog.filter_by_category("scifi")), vec!["Dune"]);
    assert!(catalog.filter_by_category("mystery").is_empty());
}

#[test]
fn test_every_mutation_is_audited() {
    let sink = MemoryAuditSink::new();
    let mut catalog = Catalog::new();
    catalog.register_sink(Box::new(sink.clone()));

    assert_eq!(catalog.borrow_as_current("Dune").err(), Some(CatalogError::NoActiveSession));
    assert!(catalog.add_user("alice").is_ok());
    assert!(catalog.login("alice").is_ok());
    assert!(catalog.add_book("Dune", "Herbert", None).is_ok());
    assert!(catalog.add_book("Dune", "Herbert", None).is_err());
    assert!(catalog.borrow_book("alice", "Dune").is_ok());
    assert!(catalog.return_book("alice", "Dune").is_ok());
    assert!(catalog.remove_book("Dune").is_ok());

    // reads are not audited
    assert!(catalog.search_book("").is_empty());
    assert!(catalog.get_history("alice").is_ok());

    let records = sink.records();
    let summary: Vec<(Operation, bool)> =
        records.iter().map(|r| (r.operation, r.outcome.is_success())).collect();
    assert_eq!(
        summary,
        vec![
            (Operation::Borrow, false),
            (Operation::AddUser, true),
            (Operation::Login, true),
            (Operation::AddBook, true),
            (Operation::AddBook, false),
            (Operation::Borrow, true),
            (Operation::Return, true),
            (Operation::RemoveBook, true),
        ]
    );
    assert_eq!(
        records.first().map(|r| r.outcome.clone()),
        Some(Outcome::Failure { reason: "No user is logged in.".to_string() })
    );
    assert_eq!(
        records.first().and_then(|r| r.parameters.get("title").cloned()),
        Some("Dune".to_string())
    );
    assert_eq!(
        records.get(4).map(|r| r.outcome.clone()),
        Some(Outcome::Failure { reason: "'Dune' already exists.".to_string() })
    );
    assert_eq!(
        records.get(5).and_then(|r| r.parameters.get("username").cloned()),
        Some("alice".to_string())
    );
}

#[test]
fn test_return_without_session_is_audited() {
    let sink = MemoryAuditSink::new();
    let mut catalog = setup_test_catalog();
    catalog.register_sink(Box::new(sink.clone()));
    catalog.logout();

    assert_eq!(catalog.return_as_current("Dune").err(), Some(CatalogError::NoActiveSession));

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records.first().map(|r| r.operation), Some(Operation::Return));
    assert!(records.first().is_some_and(|r| !r.outcome.is_success()));
}

#[test]
fn test_add_book_audit_keeps_missing_category_apart_from_empty() {
    let sink = MemoryAuditSink::new();
    let mut catalog = Catalog::new();
    catalog.register_sink(Box::new(sink.clone()));

    assert!(catalog.add_book("Emma", "Jane Austen", None).is_ok());
    assert!(catalog.add_book("Blank", "Nobody", Some("")).is_ok());
    assert!(catalog.add_book("Dune", "Frank Herbert", Some("scifi")).is_ok());

    let categories: Vec<Option<String>> =
        sink.records().iter().map(|r| r.parameters.get("category").cloned()).collect();
    assert_eq!(categories, vec![None, Some(String::new()), Some("scifi".to_string())]);
}

/// Operation applied by the add/remove property test
#[derive(Debug, Clone)]
enum Step {
    /// Add a book with this title
    Add(String),
    /// Remove a book with this title
    Remove(String),
}

/// Strategy over a small title alphabet so adds and removes collide often
fn step_strategy() -> impl Strategy<Value = Step> {
    let title = prop::sample::select(vec!["Dune", "Emma", "Ulysses", "dune", "It"]);
    prop_oneof![
        title.clone().prop_map(|t| Step::Add(t.to_string())),
        title.prop_map(|t| Step::Remove(t.to_string())),
    ]
}

proptest! {
    /// An empty search always lists exactly the books currently present
    #[test]
    fn prop_empty_search_matches_present_books(
        steps in prop::collection::vec(step_strategy(), 0..40),
    ) {
        let mut catalog = Catalog::new();
        let mut expected: Vec<String> = Vec::new();

        for step in steps {
            match step {
                Step::Add(title) => {
                    let added = catalog.add_book(&title, "Author", None).is_ok();
                    prop_assert_eq!(added, !expected.contains(&title));
                    if added {
                        expected.push(title);
                    }
                }
                Step::Remove(title) => {
                    let removed = catalog.remove_book(&title).is_ok();
                    prop_assert_eq!(removed, expected.contains(&title));
                    expected.retain(|t| *t != title);
                }
            }
        }

        prop_assert_eq!(titles(&catalog.search_book("")), expected);
    }

    /// Search ignores the case of the query
    #[test]
    fn prop_search_ignores_query_case(query in "[a-zA-Z]{0,6}") {
        let catalog = setup_test_catalog();
        prop_assert_eq!(
            titles(&catalog.search_book(&query.to_uppercase())),
            titles(&catalog.search_book(&query.to_lowercase()))
        );
    }
}
