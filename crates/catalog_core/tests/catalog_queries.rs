use catalog_core::db::open_db_in_memory;
use catalog_core::{
    AccessError, AuthorDraft, BookDraft, BookInstanceId, Capability, CatalogQueryService,
    CatalogRepository, LoanRepository, LoanStatus, NewBookInstance, PageRequest, ReaderRepository,
    RequestContext, ServiceError, SqliteCatalogRepository, SqliteLoanRepository,
    SqliteReaderRepository,
};
use chrono::NaiveDate;
use rusqlite::Connection;

type QueryService<'conn> = CatalogQueryService<
    SqliteCatalogRepository<'conn>,
    SqliteLoanRepository<'conn>,
    SqliteReaderRepository<'conn>,
>;

fn queries(conn: &Connection) -> QueryService<'_> {
    CatalogQueryService::new(
        SqliteCatalogRepository::try_new(conn).unwrap(),
        SqliteLoanRepository::try_new(conn).unwrap(),
        SqliteReaderRepository::try_new(conn).unwrap(),
    )
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn add_book(conn: &Connection, title: &str) -> i64 {
    SqliteCatalogRepository::try_new(conn)
        .unwrap()
        .create_book(&BookDraft::new(title, "0000000000"))
        .unwrap()
        .id
}

fn add_copy(conn: &Connection, book_id: i64, status: LoanStatus) -> BookInstanceId {
    let mut copy = NewBookInstance::new(book_id, "First edition");
    copy.status = status;
    SqliteLoanRepository::try_new(conn)
        .unwrap()
        .create_instance(&copy)
        .unwrap()
        .id
}

#[test]
fn index_counts_reflect_catalog_contents() {
    let conn = open_db_in_memory().unwrap();
    let catalog = SqliteCatalogRepository::try_new(&conn).unwrap();
    catalog.create_genre("Fantasy").unwrap();
    catalog.create_author(&AuthorDraft::new("Frank", "Herbert")).unwrap();
    let dune = add_book(&conn, "Dune");
    add_book(&conn, "Children of Dune");
    add_copy(&conn, dune, LoanStatus::Available);
    add_copy(&conn, dune, LoanStatus::Available);
    add_copy(&conn, dune, LoanStatus::Maintenance);

    let queries = queries(&conn);
    assert_eq!(queries.count_books().unwrap(), 2);
    assert_eq!(queries.count_instances().unwrap(), 3);
    assert_eq!(queries.count_available_instances().unwrap(), 2);
    assert_eq!(queries.count_authors().unwrap(), 1);
    assert_eq!(queries.count_genres().unwrap(), 1);
}

#[test]
fn title_search_ignores_case_and_blank_terms() {
    let conn = open_db_in_memory().unwrap();
    add_book(&conn, "Dune");
    add_book(&conn, "Children of Dune");
    add_book(&conn, "Emma");
    add_book(&conn, "Война и мир");

    let queries = queries(&conn);
    assert_eq!(queries.search_books_by_title("dune").unwrap(), 2);
    assert_eq!(queries.search_books_by_title("DUNE").unwrap(), 2);
    assert_eq!(queries.search_books_by_title("  emma ").unwrap(), 1);
    assert_eq!(queries.search_books_by_title("ВОЙНА").unwrap(), 1);
    assert_eq!(queries.search_books_by_title("missing").unwrap(), 0);
    assert_eq!(queries.search_books_by_title("").unwrap(), 4);
    assert_eq!(queries.search_books_by_title("   ").unwrap(), 4);
}

#[test]
fn search_term_is_matched_literally() {
    let conn = open_db_in_memory().unwrap();
    add_book(&conn, "100% Wolf");
    add_book(&conn, "Wolf Hall");

    let queries = queries(&conn);
    assert_eq!(queries.search_books_by_title("%").unwrap(), 1);
    assert_eq!(queries.search_books_by_title("_").unwrap(), 0);
}

#[test]
fn catalog_summary_uses_search_term_for_book_count_only() {
    let conn = open_db_in_memory().unwrap();
    let dune = add_book(&conn, "Dune");
    add_book(&conn, "Emma");
    add_copy(&conn, dune, LoanStatus::Available);

    let queries = queries(&conn);
    let summary = queries.catalog_summary(Some(" dune ")).unwrap();
    assert_eq!(summary.num_books, 1);
    assert_eq!(summary.num_instances, 1);
    assert_eq!(summary.num_instances_available, 1);
    assert_eq!(summary.search_term, "dune");

    let unfiltered = queries.catalog_summary(None).unwrap();
    assert_eq!(unfiltered.num_books, 2);
    assert_eq!(unfiltered.search_term, "");
}

#[test]
fn book_listing_is_paginated_by_title() {
    let conn = open_db_in_memory().unwrap();
    for n in (1..=12).rev() {
        add_book(&conn, &format!("Book {n:02}"));
    }

    let queries = queries(&conn);
    let first = queries.list_books(&PageRequest::first()).unwrap();
    assert_eq!(first.items.len(), 10);
    assert_eq!(first.total, 12);
    assert_eq!(first.num_pages(), 2);
    assert!(first.has_next());
    assert_eq!(first.items[0].title, "Book 01");

    let second = queries.list_books(&PageRequest::number(2)).unwrap();
    assert_eq!(second.items.len(), 2);
    assert!(!second.has_next());
    assert_eq!(second.items[1].title, "Book 12");

    let past_end = queries.list_books(&PageRequest::number(9)).unwrap();
    assert!(past_end.items.is_empty());
}

#[test]
fn author_listing_orders_by_last_then_first_name() {
    let conn = open_db_in_memory().unwrap();
    let catalog = SqliteCatalogRepository::try_new(&conn).unwrap();
    catalog.create_author(&AuthorDraft::new("Zadie", "Smith")).unwrap();
    catalog.create_author(&AuthorDraft::new("Ali", "Smith")).unwrap();
    catalog.create_author(&AuthorDraft::new("Jane", "Austen")).unwrap();

    let page = queries(&conn).list_authors(&PageRequest::first()).unwrap();
    let names: Vec<String> = page.items.iter().map(|a| a.display_name()).collect();
    assert_eq!(names, vec!["Austen, Jane", "Smith, Ali", "Smith, Zadie"]);
}

#[test]
fn book_detail_collects_related_records() {
    let conn = open_db_in_memory().unwrap();
    let catalog = SqliteCatalogRepository::try_new(&conn).unwrap();
    let author = catalog
        .create_author(&AuthorDraft::new("Leo", "Tolstoy"))
        .unwrap();
    let language = catalog.create_language("Russian").unwrap();
    let mut genre_ids = Vec::new();
    for name in ["Drama", "History", "Romance", "War"] {
        genre_ids.push(catalog.create_genre(name).unwrap().id);
    }
    let mut draft = BookDraft::new("War and Peace", "9780199232765");
    draft.author_id = Some(author.id);
    draft.language_id = Some(language.id);
    draft.genre_ids = genre_ids;
    let book = catalog.create_book(&draft).unwrap();
    add_copy(&conn, book.id, LoanStatus::Available);

    let detail = queries(&conn).book_detail(book.id).unwrap();
    assert_eq!(detail.author.unwrap().id, author.id);
    assert_eq!(detail.language.unwrap().name, "Russian");
    assert_eq!(detail.genres.len(), 4);
    assert_eq!(detail.display_genre, "Drama, History, Romance");
    assert_eq!(detail.instances.len(), 1);
    assert_eq!(detail.instances[0].book_title.as_deref(), Some("War and Peace"));
}

#[test]
fn detail_pages_for_missing_rows_return_not_found() {
    let conn = open_db_in_memory().unwrap();
    let queries = queries(&conn);
    assert!(matches!(
        queries.book_detail(5).unwrap_err(),
        ServiceError::NotFound { entity: "book", .. }
    ));
    assert!(matches!(
        queries.author_detail(5).unwrap_err(),
        ServiceError::NotFound { entity: "author", .. }
    ));
}

#[test]
fn author_detail_lists_their_books() {
    let conn = open_db_in_memory().unwrap();
    let catalog = SqliteCatalogRepository::try_new(&conn).unwrap();
    let author = catalog.create_author(&AuthorDraft::new("Jane", "Austen")).unwrap();
    for title in ["Persuasion", "Emma"] {
        let mut draft = BookDraft::new(title, "1");
        draft.author_id = Some(author.id);
        catalog.create_book(&draft).unwrap();
    }
    add_book(&conn, "Unrelated");

    let detail = queries(&conn).author_detail(author.id).unwrap();
    let titles: Vec<&str> = detail.books.iter().map(|b| b.title.as_str()).collect();
    assert_eq!(titles, vec!["Emma", "Persuasion"]);
}

#[test]
fn borrowed_listing_is_scoped_to_caller_and_sorted_by_due_date() {
    let conn = open_db_in_memory().unwrap();
    let readers = SqliteReaderRepository::try_new(&conn).unwrap();
    let loans = SqliteLoanRepository::try_new(&conn).unwrap();
    let alice = readers.create_user("alice").unwrap();
    let bob = readers.create_user("bob").unwrap();
    let book = add_book(&conn, "Dune");

    let late = add_copy(&conn, book, LoanStatus::Available);
    let soon = add_copy(&conn, book, LoanStatus::Available);
    let undated = add_copy(&conn, book, LoanStatus::Available);
    let bobs = add_copy(&conn, book, LoanStatus::Available);
    loans.lend_instance(late, alice.id, date(2024, 12, 20)).unwrap();
    loans.lend_instance(soon, alice.id, date(2024, 11, 30)).unwrap();
    loans.lend_instance(undated, alice.id, date(2024, 12, 1)).unwrap();
    conn.execute(
        "UPDATE book_instances SET due_back = NULL WHERE id = ?1;",
        [undated.to_string()],
    )
    .unwrap();
    loans.lend_instance(bobs, bob.id, date(2024, 11, 1)).unwrap();

    let queries = queries(&conn);
    let mine = queries
        .list_borrowed_by_user(&RequestContext::for_user(alice.id))
        .unwrap();
    let ids: Vec<_> = mine.iter().map(|copy| copy.id).collect();
    assert_eq!(ids, vec![undated, soon, late]);
    assert!(mine.iter().all(|copy| copy.status == LoanStatus::OnLoan));

    let librarian = RequestContext::for_user(bob.id)
        .with_capability(Capability::CanMarkReturned)
        .authorize(Capability::CanMarkReturned)
        .unwrap();
    let all = queries.list_all_borrowed(&librarian).unwrap();
    assert_eq!(all.len(), 4);
    assert_eq!(all[0].id, undated);
    assert_eq!(all[1].id, bobs);
}

#[test]
fn borrowed_listing_requires_identity_or_grant() {
    let conn = open_db_in_memory().unwrap();
    let queries = queries(&conn);

    let err = queries
        .list_borrowed_by_user(&RequestContext::anonymous())
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::PermissionDenied(AccessError::AnonymousCaller)
    ));

    let wrong_grant = RequestContext::for_user(1)
        .with_capability(Capability::AddBook)
        .authorize(Capability::AddBook)
        .unwrap();
    let err = queries.list_all_borrowed(&wrong_grant).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::PermissionDenied(AccessError::CapabilityDenied {
            capability: Capability::CanMarkReturned
        })
    ));
}
