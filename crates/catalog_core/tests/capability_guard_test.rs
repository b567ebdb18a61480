use catalog_core::db::open_db_in_memory;
use catalog_core::{
    parse_capability, AccessError, AuthorDraft, BookDraft, Capability, CatalogAdminService,
    CatalogRepository, RequestContext, ServiceError, SqliteCatalogRepository,
    SqliteReaderRepository,
};

fn denied_capability(err: ServiceError) -> Capability {
    match err {
        ServiceError::PermissionDenied(AccessError::CapabilityDenied { capability }) => capability,
        other => panic!("expected capability denial, got {other}"),
    }
}

#[test]
fn anonymous_context_cannot_obtain_any_grant() {
    for capability in Capability::all() {
        let ctx = RequestContext::anonymous().with_capability(*capability);
        assert_eq!(
            ctx.authorize(*capability).unwrap_err(),
            AccessError::AnonymousCaller
        );
    }
}

#[test]
fn user_without_capability_is_denied() {
    let ctx = RequestContext::for_user(3).with_capability(Capability::AddBook);
    assert!(ctx.authorize(Capability::AddBook).is_ok());
    assert_eq!(
        ctx.authorize(Capability::DeleteBook).unwrap_err(),
        AccessError::CapabilityDenied {
            capability: Capability::DeleteBook
        }
    );
}

#[test]
fn admin_operations_reject_grants_for_other_capabilities() {
    let conn = open_db_in_memory().unwrap();
    let catalog = SqliteCatalogRepository::try_new(&conn).unwrap();
    let author = catalog.create_author(&AuthorDraft::new("A", "B")).unwrap();
    let book = catalog.create_book(&BookDraft::new("T", "1")).unwrap();
    let admin = CatalogAdminService::new(
        SqliteCatalogRepository::try_new(&conn).unwrap(),
        SqliteReaderRepository::try_new(&conn).unwrap(),
    );

    let unrelated = RequestContext::for_user(1)
        .with_capability(Capability::CanMarkReturned)
        .authorize(Capability::CanMarkReturned)
        .unwrap();
    let draft = AuthorDraft::new("C", "D");
    let book_draft = BookDraft::new("U", "2");

    let denials = [
        denied_capability(admin.create_genre(&unrelated, "Poetry").unwrap_err()),
        denied_capability(admin.create_language(&unrelated, "Welsh").unwrap_err()),
        denied_capability(admin.create_author(&unrelated, &draft).unwrap_err()),
        denied_capability(admin.update_author(&unrelated, author.id, &draft).unwrap_err()),
        denied_capability(admin.delete_author(&unrelated, author.id).unwrap_err()),
        denied_capability(admin.create_book(&unrelated, &book_draft).unwrap_err()),
        denied_capability(admin.update_book(&unrelated, book.id, &book_draft).unwrap_err()),
        denied_capability(admin.delete_book(&unrelated, book.id).unwrap_err()),
    ];
    assert_eq!(
        denials,
        [
            Capability::AddGenre,
            Capability::AddLanguage,
            Capability::AddAuthor,
            Capability::ChangeAuthor,
            Capability::DeleteAuthor,
            Capability::AddBook,
            Capability::ChangeBook,
            Capability::DeleteBook,
        ]
    );

    assert_eq!(catalog.count_authors().unwrap(), 1);
    assert_eq!(catalog.count_books().unwrap(), 1);
    assert_eq!(catalog.count_genres().unwrap(), 0);
}

#[test]
fn capability_codenames_parse_with_optional_prefix() {
    assert_eq!(
        parse_capability("can_mark_returned").unwrap(),
        Capability::CanMarkReturned
    );
    assert_eq!(
        parse_capability("catalog.add_bookinstance").unwrap(),
        Capability::AddBookInstance
    );
    assert!(parse_capability("launch_rockets").is_err());
    assert!(parse_capability("  ").is_err());
}
