use std::sync::Arc;

use super::*;
use crate::models::{CallMinute, Segment, SegmentType};
use crate::notify::testing::RecordingMailer;

struct Fixture {
    service: NoteService,
    mailer: Arc<RecordingMailer>,
    owner: User,
    collaborator: User,
    outsider: User,
    jane: Contact,
    idea: Idea,
}

fn fixture() -> Fixture {
    fixture_with(Arc::new(RecordingMailer::default()))
}

fn fixture_with(mailer: Arc<RecordingMailer>) -> Fixture {
    let db = Database::in_memory().expect("failed to create in-memory database");
    let service = NoteService::new(db).with_notifier(NotificationDispatcher::new(mailer.clone()));

    let owner = service
        .create_user("Olivia Owner", "olivia@example.com")
        .expect("failed to create owner");
    let collaborator = service
        .create_user("Carl Collab", "carl@example.com")
        .expect("failed to create collaborator");
    let outsider = service
        .create_user("Otto Outsider", "otto@example.com")
        .expect("failed to create outsider");
    let jane = service
        .create_contact(owner.id, "Jane Doe", Some("jane@example.com"))
        .expect("failed to create contact");
    let idea = service
        .create_idea(owner.id, "Launch")
        .expect("failed to create idea");
    let idea = service
        .add_collaborator(idea.id, collaborator.id)
        .expect("failed to add collaborator");

    Fixture {
        service,
        mailer,
        owner,
        collaborator,
        outsider,
        jane,
        idea,
    }
}

fn plain(text: &str) -> NoteBody {
    NoteBody::PlainText(text.to_string())
}

fn count(service: &NoteService, table: &str) -> i64 {
    service
        .database()
        .connection()
        .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .expect("failed to count rows")
}

fn follow_up_minute() -> CallMinute {
    let mut minute = CallMinute::new("2024-04-01", "Jane Doe");
    minute.push(Segment::new(SegmentType::Insight, "Budget is flexible", ""));
    minute.push(Segment::new(SegmentType::ToDo, "Follow up", "send pricing"));
    minute
}

#[test]
fn note_service_construction_with_in_memory_database() {
    let db = Database::in_memory().expect("failed to create in-memory database");
    let service = NoteService::new(db);

    let count: i64 = service
        .database()
        .connection()
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table'",
            [],
            |row| row.get(0),
        )
        .expect("failed to query schema");

    assert!(count >= 9, "expected all tables to be created");
}

#[test]
fn list_notes_options_default_implementation() {
    let options = ListNotesOptions::default();

    assert_eq!(options.limit, None);
    assert_eq!(options.mentioning, None);
    assert!(!options.include_hidden);
    assert_eq!(options.order, SortOrder::Descending);
}

// --- people and ideas ---

#[test]
fn create_user_rejects_blank_name_bad_email_and_duplicates() {
    let f = fixture();

    for (name, email) in [
        ("  ", "a@example.com"),
        ("Ann", "not-an-email"),
        ("Olivia Again", "OLIVIA@example.com"),
    ] {
        let err = f.service.create_user(name, email).unwrap_err();
        assert!(
            matches!(err.downcast_ref::<NoteError>(), Some(NoteError::InvalidInput(_))),
            "expected invalid input for {name:?} / {email:?}"
        );
    }
}

#[test]
fn add_collaborator_is_idempotent() {
    let f = fixture();

    let idea = f
        .service
        .add_collaborator(f.idea.id, f.collaborator.id)
        .expect("failed to re-add collaborator");
    let idea = f
        .service
        .add_collaborator(idea.id, f.owner.id)
        .expect("failed to add owner as collaborator");

    assert_eq!(idea.collaborator_ids, vec![f.collaborator.id]);
}

#[test]
fn create_contact_requires_existing_owner() {
    let f = fixture();

    let err = f
        .service
        .create_contact(UserId::new(999), "Ghost", None)
        .unwrap_err();
    assert_eq!(
        err.downcast_ref::<NoteError>(),
        Some(&NoteError::not_found("user", 999))
    );
}

// --- notes ---

#[test]
fn plain_note_mention_is_tagged_and_survives_reread() {
    let f = fixture();

    let note = f
        .service
        .create_note(
            f.owner.id,
            NewNote::new(plain("Great call with @Jane Doe today, @Jane Doe agreed")),
        )
        .expect("failed to create note");

    assert_eq!(note.tagged().contacts.len(), 1);
    assert!(note.tagged().contacts.contains(&f.jane.id));
    assert!(note.tagged().users.is_empty());
    assert_eq!(count(&f.service, "note_contact_tags"), 1);

    let reread = f
        .service
        .get_note(note.id())
        .expect("failed to get note")
        .expect("note should exist");
    assert_eq!(reread.tagged(), note.tagged());
    assert_eq!(reread.intent(), NoteIntent::Reflection);
}

#[test]
fn empty_body_is_rejected_before_any_write() {
    let f = fixture();

    for body in [
        plain("   \n "),
        NoteBody::RichHtml("<p>&nbsp;<br></p>".to_string()),
        NoteBody::CallMinute(CallMinute::new("2024-01-01", "")),
    ] {
        let err = f
            .service
            .create_note(f.owner.id, NewNote::new(body).on_idea(f.idea.id))
            .unwrap_err();
        assert_eq!(err.downcast_ref::<NoteError>(), Some(&NoteError::EmptyBody));
    }

    assert_eq!(count(&f.service, "notes"), 0);
    assert_eq!(count(&f.service, "todos"), 0);
}

#[test]
fn note_on_unknown_idea_is_not_found() {
    let f = fixture();

    let err = f
        .service
        .create_note(f.owner.id, NewNote::new(plain("hi")).on_idea(IdeaId::new(404)))
        .unwrap_err();
    assert_eq!(
        err.downcast_ref::<NoteError>(),
        Some(&NoteError::not_found("idea", 404))
    );
}

#[test]
fn categories_are_trimmed_and_deduplicated_in_order() {
    let f = fixture();

    let mut new = NewNote::new(plain("Quarterly review"));
    new.categories = vec![
        " sales ".to_string(),
        "".to_string(),
        "Sales".to_string(),
        "renewal".to_string(),
    ];
    let note = f
        .service
        .create_note(f.owner.id, new)
        .expect("failed to create note");

    assert_eq!(note.categories().to_vec(), vec!["sales", "renewal"]);
}

#[test]
fn explicit_tags_merge_with_resolved_mentions_and_unknown_ids_are_dropped() {
    let f = fixture();

    let mut new = NewNote::new(plain("Notes for @Jane Doe")).on_idea(f.idea.id);
    new.tagged.insert(MentionTarget::User(f.collaborator.id));
    new.tagged.insert(MentionTarget::Contact(ContactId::new(77)));

    let note = f
        .service
        .create_note(f.owner.id, new)
        .expect("failed to create note");

    let expected: TaggedIds = [
        MentionTarget::Contact(f.jane.id),
        MentionTarget::User(f.collaborator.id),
    ]
    .into_iter()
    .collect();
    assert_eq!(note.tagged(), &expected);
}

#[test]
fn call_minute_mentions_and_attendees_are_tagged() {
    let f = fixture();

    let mut minute = CallMinute::new("2024-04-01", "Jane Doe, Somebody Else");
    minute.push(Segment::new(
        SegmentType::Decision,
        "Ship it",
        "@Carl Collab owns rollout",
    ));
    let note = f
        .service
        .create_note(
            f.owner.id,
            NewNote::new(NoteBody::CallMinute(minute)).on_idea(f.idea.id),
        )
        .expect("failed to create note");

    assert!(note.tagged().contacts.contains(&f.jane.id));
    assert!(note.tagged().users.contains(&f.collaborator.id));
    assert_eq!(note.body().kind(), BodyKind::CallMinute);
}

// --- todo promotion ---

#[test]
fn to_do_segment_is_promoted_once_across_saves() {
    let f = fixture();

    let note = f
        .service
        .create_note(
            f.owner.id,
            NewNote::new(NoteBody::CallMinute(follow_up_minute())).on_idea(f.idea.id),
        )
        .expect("failed to create note");

    let todos = f.service.list_todos(f.idea.id).expect("failed to list todos");
    assert_eq!(todos.len(), 1);
    assert_eq!(todos[0].text(), "Follow up - send pricing");
    assert_eq!(todos[0].status(), TodoStatus::NotStarted);
    assert!(!todos[0].completed());
    assert!(!todos[0].is_urgent());
    assert_eq!(todos[0].origin_note_id(), Some(note.id()));

    f.service
        .update_note(
            f.owner.id,
            note.id(),
            NoteUpdate {
                body: Some(NoteBody::CallMinute(follow_up_minute())),
                ..Default::default()
            },
        )
        .expect("failed to update note");

    assert_eq!(f.service.list_todos(f.idea.id).unwrap().len(), 1);
}

#[test]
fn call_minute_without_idea_promotes_nothing() {
    let f = fixture();

    f.service
        .create_note(
            f.owner.id,
            NewNote::new(NoteBody::CallMinute(follow_up_minute())).about_contact(f.jane.id),
        )
        .expect("failed to create note");

    assert_eq!(count(&f.service, "todos"), 0);
}

#[test]
fn deleting_a_note_keeps_its_promoted_todos() {
    let f = fixture();

    let note = f
        .service
        .create_note(
            f.owner.id,
            NewNote::new(NoteBody::CallMinute(follow_up_minute())).on_idea(f.idea.id),
        )
        .unwrap();
    f.service.delete_note(f.owner.id, note.id()).unwrap();

    let todos = f.service.list_todos(f.idea.id).unwrap();
    assert_eq!(todos.len(), 1);
    assert_eq!(todos[0].origin_note_id(), None);
    assert_eq!(count(&f.service, "note_contact_tags"), 0);
}

// --- notifications ---

#[test]
fn newly_tagged_users_get_one_email_each() {
    let f = fixture();

    let note = f
        .service
        .create_note(
            f.owner.id,
            NewNote::new(plain("@Carl Collab please review")).on_idea(f.idea.id),
        )
        .expect("failed to create note");
    assert_eq!(f.mailer.recipients(), vec!["carl@example.com"]);

    let sent = f.mailer.sent.lock().unwrap()[0].clone();
    assert_eq!(sent.idea_title, "Launch");
    assert_eq!(sent.sender_name, "Olivia Owner");
    assert_eq!(sent.excerpt, "@Carl Collab please review");

    // re-saving with the same mention sends nothing new
    f.service
        .update_note(
            f.owner.id,
            note.id(),
            NoteUpdate {
                body: Some(plain("@Carl Collab please review again")),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(f.mailer.recipients().len(), 1);
}

#[test]
fn self_mentions_and_notes_without_idea_do_not_notify() {
    let f = fixture();

    f.service
        .create_note(
            f.owner.id,
            NewNote::new(plain("reminder for @Olivia Owner")).on_idea(f.idea.id),
        )
        .unwrap();

    let mut new = NewNote::new(plain("contact note"));
    new.tagged.insert(MentionTarget::User(f.collaborator.id));
    f.service.create_note(f.owner.id, new).unwrap();

    assert!(f.mailer.recipients().is_empty());
}

#[test]
fn mail_failure_does_not_fail_the_save() {
    let f = fixture_with(Arc::new(RecordingMailer::failing_for("carl@example.com")));

    let note = f
        .service
        .create_note(
            f.owner.id,
            NewNote::new(plain("@Carl Collab ping")).on_idea(f.idea.id),
        )
        .expect("save should succeed even when mail fails");

    assert!(f.service.get_note(note.id()).unwrap().is_some());
}

// --- authorization ---

#[test]
fn only_author_idea_owner_or_contact_owner_may_delete() {
    let f = fixture();

    let by_collab = f
        .service
        .create_note(f.collaborator.id, NewNote::new(plain("collab note")).on_idea(f.idea.id))
        .unwrap();

    let err = f
        .service
        .delete_note(f.outsider.id, by_collab.id())
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<NoteError>(),
        Some(NoteError::PermissionDenied { .. })
    ));

    // idea owner may delete a collaborator's note
    f.service.delete_note(f.owner.id, by_collab.id()).unwrap();
    assert!(f.service.get_note(by_collab.id()).unwrap().is_none());

    // contact owner may edit a note someone else wrote about their contact
    let about_jane = f
        .service
        .create_note(f.outsider.id, NewNote::new(plain("met Jane")).about_contact(f.jane.id))
        .unwrap();
    let pinned = f.service.set_pinned(f.owner.id, about_jane.id(), true).unwrap();
    assert!(pinned.is_pinned());

    let err = f
        .service
        .update_note(f.collaborator.id, about_jane.id(), NoteUpdate::default())
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<NoteError>(),
        Some(NoteError::PermissionDenied { .. })
    ));
}

#[test]
fn delete_missing_note_is_not_found() {
    let f = fixture();

    let err = f.service.delete_note(f.owner.id, NoteId::new(5)).unwrap_err();
    assert_eq!(
        err.downcast_ref::<NoteError>(),
        Some(&NoteError::not_found("note", 5))
    );
}

#[test]
fn update_can_replace_tags_and_rejects_empty_body() {
    let f = fixture();

    let mut new = NewNote::new(plain("plain note")).on_idea(f.idea.id);
    new.tagged.insert(MentionTarget::Contact(f.jane.id));
    let note = f.service.create_note(f.owner.id, new).unwrap();

    let updated = f
        .service
        .update_note(
            f.owner.id,
            note.id(),
            NoteUpdate {
                tagged: Some(TaggedIds::new()),
                intent: Some(NoteIntent::FollowUp),
                ..Default::default()
            },
        )
        .unwrap();
    assert!(updated.tagged().is_empty());
    assert_eq!(updated.intent(), NoteIntent::FollowUp);

    let err = f
        .service
        .update_note(
            f.owner.id,
            note.id(),
            NoteUpdate {
                body: Some(plain(" ")),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert_eq!(err.downcast_ref::<NoteError>(), Some(&NoteError::EmptyBody));
    assert_eq!(
        f.service.get_note(note.id()).unwrap().unwrap().body(),
        &plain("plain note")
    );
}

// --- listing ---

#[test]
fn list_notes_filters_by_mention_and_hides_hidden_notes() {
    let f = fixture();

    let first = f
        .service
        .create_note(f.owner.id, NewNote::new(plain("with @Jane Doe")))
        .unwrap();
    let second = f
        .service
        .create_note(f.owner.id, NewNote::new(plain("no mention")))
        .unwrap();
    let third = f
        .service
        .create_note(f.owner.id, NewNote::new(plain("@Jane Doe again")))
        .unwrap();
    f.service.set_hidden(f.owner.id, third.id(), true).unwrap();

    let mentioning = f
        .service
        .list_notes(ListNotesOptions {
            mentioning: Some(MentionTarget::Contact(f.jane.id)),
            ..Default::default()
        })
        .unwrap();
    let ids: Vec<NoteId> = mentioning.iter().map(Note::id).collect();
    assert_eq!(ids, vec![first.id()]);

    let all = f
        .service
        .list_notes(ListNotesOptions {
            include_hidden: true,
            order: SortOrder::Ascending,
            ..Default::default()
        })
        .unwrap();
    let ids: Vec<NoteId> = all.iter().map(Note::id).collect();
    assert_eq!(ids, vec![first.id(), second.id(), third.id()]);
}

#[test]
fn pinned_notes_are_listed_first() {
    let f = fixture();

    let first = f
        .service
        .create_note(f.owner.id, NewNote::new(plain("one")).on_idea(f.idea.id))
        .unwrap();
    let second = f
        .service
        .create_note(f.owner.id, NewNote::new(plain("two")).on_idea(f.idea.id))
        .unwrap();
    f.service.set_pinned(f.owner.id, second.id(), true).unwrap();

    let notes = f
        .service
        .list_notes(ListNotesOptions {
            idea_id: Some(f.idea.id),
            order: SortOrder::Ascending,
            limit: Some(2),
            ..Default::default()
        })
        .unwrap();
    let ids: Vec<NoteId> = notes.iter().map(Note::id).collect();
    assert_eq!(ids, vec![second.id(), first.id()]);
    assert!(notes[0].is_pinned());
}

// --- candidates and rendering ---

#[test]
fn empty_query_lists_up_to_five_candidates_without_duplicates() {
    let f = fixture();
    for i in 0..6 {
        f.service
            .create_contact(f.owner.id, &format!("Contact {i}"), None)
            .unwrap();
    }

    let candidates = f
        .service
        .mention_candidates(f.owner.id, Some(f.idea.id), "", 5)
        .unwrap();

    assert_eq!(candidates.len(), 5);
    assert_eq!(candidates[0].target, MentionTarget::User(f.owner.id));
    assert_eq!(candidates[1].target, MentionTarget::User(f.collaborator.id));
    let mut targets: Vec<MentionTarget> = candidates.iter().map(|c| c.target).collect();
    targets.dedup();
    assert_eq!(targets.len(), 5);

    let jane = f
        .service
        .mention_candidates(f.owner.id, None, "jan", 5)
        .unwrap();
    assert_eq!(jane.len(), 1);
    assert_eq!(jane[0].detail.as_deref(), Some("jane@example.com"));
}

#[test]
fn render_note_links_tagged_contacts() {
    let f = fixture();

    let note = f
        .service
        .create_note(
            f.owner.id,
            NewNote::new(plain("Great call with @Jane Doe today")),
        )
        .unwrap();

    let options = RenderOptions::new("https://crm.example.com");
    let html = f
        .service
        .render_note(note.id(), &options)
        .unwrap()
        .to_html(&options);

    assert!(html.contains(&format!(
        r#"<a href="https://crm.example.com/contacts/{}" class="mention mention-contact""#,
        f.jane.id
    )));
    assert!(!html.contains("@Jane Doe"));
}

// --- todos ---

#[test]
fn todo_status_changes_stamp_and_clear_completion() {
    let f = fixture();

    let todo = f
        .service
        .add_todo(f.idea.id, NewTodo::new("Book venue"))
        .unwrap();
    assert_eq!(todo.status(), TodoStatus::NotStarted);

    let done = f.service.set_todo_status(todo.id(), TodoStatus::Done).unwrap();
    assert!(done.completed());
    assert!(done.completed_at().is_some());

    let reread = f.service.list_todos(f.idea.id).unwrap();
    assert_eq!(reread[0].status(), TodoStatus::Done);
    assert!(reread[0].completed_at().is_some());

    let reopened = f
        .service
        .set_todo_status(todo.id(), TodoStatus::Working)
        .unwrap();
    assert!(!reopened.completed());
    assert_eq!(reopened.completed_at(), None);
}

#[test]
fn add_todo_rejects_blank_text() {
    let f = fixture();

    let err = f.service.add_todo(f.idea.id, NewTodo::new("  ")).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<NoteError>(),
        Some(NoteError::InvalidInput(_))
    ));
}

#[test]
fn legacy_todos_import_with_dangling_references_cleared() {
    let f = fixture();

    let inner = format!(
        r#"[{{"text":"Draft deck","completed":true,"assigneeId":{}}},{{"text":"Call","status":"Working","assigneeId":999,"originNoteId":42,"dueDate":"2024-06-01"}}]"#,
        f.collaborator.id
    );
    let raw = serde_json::to_string(&inner).unwrap();

    let todos = f.service.import_legacy_todos(f.idea.id, &raw).unwrap();

    assert_eq!(todos.len(), 2);
    assert_eq!(todos[0].status(), TodoStatus::Done);
    assert!(todos[0].completed_at().is_some());
    assert_eq!(todos[0].assignee_id(), Some(f.collaborator.id));
    assert_eq!(todos[1].status(), TodoStatus::Working);
    assert_eq!(todos[1].assignee_id(), None);
    assert_eq!(todos[1].origin_note_id(), None);
    assert_eq!(
        todos[1].due_date(),
        Some(time::macros::date!(2024 - 06 - 01))
    );

    let err = f
        .service
        .import_legacy_todos(f.idea.id, "{not json")
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<NoteError>(),
        Some(NoteError::InvalidInput(_))
    ));
}
