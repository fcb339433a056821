use chrono::{Duration, Utc};
use vectal::db::Database;
use vectal::models::*;
use speculate2::speculate;
use uuid::Uuid;

fn create_test_user(db: &Database, email: &str) -> User {
    db.create_user(email, "not-a-real-hash", None)
        .expect("Failed to create user")
        .expect("Email should be free")
}

fn create_test_task(db: &Database, owner: Uuid, title: &str) -> Task {
    db.create_task(
        owner,
        CreateTaskInput {
            title: title.to_string(),
            ..Default::default()
        },
    )
    .expect("Failed to create task")
}

fn create_test_note(db: &Database, owner: Uuid, title: &str, tags: &[&str]) -> Note {
    db.create_note(
        owner,
        CreateNoteInput {
            title: title.to_string(),
            content: Some(format!("Body of {title}")),
            tags: Some(tags.iter().map(|t| t.to_string()).collect()),
            ..Default::default()
        },
    )
    .expect("Failed to create note")
}

fn create_test_project(db: &Database, owner: Uuid, name: &str) -> Project {
    db.create_project(
        owner,
        CreateProjectInput {
            name: name.to_string(),
            ..Default::default()
        },
    )
    .expect("Failed to create project")
}

speculate! {
    before {
        let db = Database::open_memory().expect("Failed to create in-memory database");
        db.migrate().expect("Failed to run migrations");
        let alice = create_test_user(&db, "alice@example.com");
        let bob = create_test_user(&db, "bob@example.com");
    }

    describe "users" {
        it "rejects a duplicate email" {
            let result = db.create_user("alice@example.com", "hash", None).unwrap();
            assert!(result.is_none());
        }

        it "returns credentials by email" {
            let (user, hash) = db
                .get_credentials("alice@example.com")
                .expect("Query failed")
                .expect("User missing");
            assert_eq!(user.id, alice.id);
            assert_eq!(hash, "not-a-real-hash");
        }

        it "stores and expires sessions" {
            db.create_session(alice.id, "live", Utc::now() + Duration::hours(1)).unwrap();
            db.create_session(alice.id, "stale", Utc::now() - Duration::hours(1)).unwrap();

            let removed = db.delete_expired_sessions(Utc::now()).expect("Delete failed");
            assert_eq!(removed, 1);
            assert!(db.get_session("live").unwrap().is_some());
            assert!(db.get_session("stale").unwrap().is_none());
        }
    }

    describe "tasks" {
        describe "create_task" {
            it "starts pending with no AI score" {
                let task = create_test_task(&db, alice.id, "Write report");
                assert_eq!(task.status, TaskStatus::Pending);
                assert_eq!(task.priority, TaskPriority::Medium);
                assert!(task.ai_priority.is_none());
                assert!(task.completed_at.is_none());
            }

            it "round-trips every field" {
                let due = Utc::now() + Duration::days(2);
                let created = db.create_task(alice.id, CreateTaskInput {
                    title: "Pay rent".to_string(),
                    description: Some("Before the 1st".to_string()),
                    priority: Some(TaskPriority::Urgent),
                    due_date: Some(due),
                    tags: Some(vec!["home".to_string(), "money".to_string()]),
                    project_id: None,
                }).expect("Failed to create");

                let found = db.get_task(created.id).unwrap().expect("Task missing");
                assert_eq!(found.title, "Pay rent");
                assert_eq!(found.description.as_deref(), Some("Before the 1st"));
                assert_eq!(found.priority, TaskPriority::Urgent);
                assert_eq!(found.tags, vec!["home", "money"]);
                assert_eq!(found.due_date.map(|d| d.timestamp_micros()), Some(due.timestamp_micros()));
            }
        }

        describe "get_tasks" {
            it "orders by status, then AI score, then newest" {
                let done = create_test_task(&db, alice.id, "done");
                let low = create_test_task(&db, alice.id, "low");
                let high = create_test_task(&db, alice.id, "high");
                let unscored = create_test_task(&db, alice.id, "unscored");
                let started = create_test_task(&db, alice.id, "started");

                db.update_task(alice.id, done.id, UpdateTaskInput {
                    status: Some(TaskStatus::Completed),
                    ..Default::default()
                }).unwrap();
                db.update_task(alice.id, started.id, UpdateTaskInput {
                    status: Some(TaskStatus::InProgress),
                    ..Default::default()
                }).unwrap();
                db.set_ai_priority(low.id, 10.0).unwrap();
                db.set_ai_priority(high.id, 90.0).unwrap();

                let titles: Vec<String> = db
                    .get_tasks(alice.id, None)
                    .unwrap()
                    .into_iter()
                    .map(|t| t.title)
                    .collect();
                assert_eq!(titles, vec!["done", "started", "high", "low", "unscored"]);
            }

            it "filters by status" {
                create_test_task(&db, alice.id, "a");
                let b = create_test_task(&db, alice.id, "b");
                db.update_task(alice.id, b.id, UpdateTaskInput {
                    status: Some(TaskStatus::Completed),
                    ..Default::default()
                }).unwrap();

                let completed = db.get_tasks(alice.id, Some(TaskStatus::Completed)).unwrap();
                assert_eq!(completed.len(), 1);
                assert_eq!(completed[0].id, b.id);
            }

            it "only returns the owner's tasks" {
                create_test_task(&db, alice.id, "mine");
                create_test_task(&db, bob.id, "theirs");

                let tasks = db.get_tasks(alice.id, None).unwrap();
                assert_eq!(tasks.len(), 1);
                assert_eq!(tasks[0].title, "mine");
            }
        }

        describe "update_task" {
            it "treats another user's task as missing" {
                let task = create_test_task(&db, alice.id, "private");
                let result = db.update_task(bob.id, task.id, UpdateTaskInput {
                    title: Some("hijacked".to_string()),
                    ..Default::default()
                }).unwrap();

                assert!(result.is_none());
                assert_eq!(db.get_task(task.id).unwrap().unwrap().title, "private");
            }

            it "keeps the AI score on edits" {
                let task = create_test_task(&db, alice.id, "scored");
                db.set_ai_priority(task.id, 42.0).unwrap();

                let updated = db.update_task(alice.id, task.id, UpdateTaskInput {
                    title: Some("renamed".to_string()),
                    ..Default::default()
                }).unwrap().unwrap();

                assert_eq!(updated.ai_priority, Some(42.0));
                assert_eq!(db.get_task(task.id).unwrap().unwrap().ai_priority, Some(42.0));
            }

            it "clears a nullable field on explicit null" {
                let task = db.create_task(alice.id, CreateTaskInput {
                    title: "dated".to_string(),
                    due_date: Some(Utc::now()),
                    ..Default::default()
                }).unwrap();

                let updated = db.update_task(alice.id, task.id, UpdateTaskInput {
                    due_date: Some(None),
                    ..Default::default()
                }).unwrap().unwrap();
                assert!(updated.due_date.is_none());
                assert!(db.get_task(task.id).unwrap().unwrap().due_date.is_none());
            }
        }

        describe "delete_completed_tasks" {
            it "is idempotent" {
                let task = create_test_task(&db, alice.id, "finish me");
                create_test_task(&db, alice.id, "keep me");
                db.update_task(alice.id, task.id, UpdateTaskInput {
                    status: Some(TaskStatus::Completed),
                    ..Default::default()
                }).unwrap();

                assert_eq!(db.delete_completed_tasks(alice.id).unwrap(), 1);
                assert_eq!(db.delete_completed_tasks(alice.id).unwrap(), 0);
                assert_eq!(db.get_tasks(alice.id, None).unwrap().len(), 1);
            }

            it "leaves other users alone" {
                let theirs = create_test_task(&db, bob.id, "bob's");
                db.update_task(bob.id, theirs.id, UpdateTaskInput {
                    status: Some(TaskStatus::Completed),
                    ..Default::default()
                }).unwrap();

                assert_eq!(db.delete_completed_tasks(alice.id).unwrap(), 0);
                assert!(db.get_task(theirs.id).unwrap().is_some());
            }
        }

        describe "get_open_tasks" {
            it "skips completed tasks" {
                let done = create_test_task(&db, alice.id, "done");
                create_test_task(&db, alice.id, "open");
                db.update_task(alice.id, done.id, UpdateTaskInput {
                    status: Some(TaskStatus::Completed),
                    ..Default::default()
                }).unwrap();

                let open = db.get_open_tasks(alice.id).unwrap();
                assert_eq!(open.len(), 1);
                assert_eq!(open[0].title, "open");
            }
        }
    }

    describe "notes" {
        it "lists newest update first" {
            let first = create_test_note(&db, alice.id, "first", &[]);
            create_test_note(&db, alice.id, "second", &[]);
            db.update_note(alice.id, first.id, UpdateNoteInput {
                is_pinned: Some(true),
                ..Default::default()
            }).unwrap();

            let titles: Vec<String> = db.get_notes(alice.id).unwrap().into_iter().map(|n| n.title).collect();
            assert_eq!(titles, vec!["first", "second"]);
        }

        it "archives previous content when it changes" {
            let note = create_test_note(&db, alice.id, "draft", &[]);

            let updated = db.update_note(alice.id, note.id, UpdateNoteInput {
                content: Some("second draft".to_string()),
                ..Default::default()
            }).unwrap().unwrap();
            assert_eq!(updated.version, 2);

            let same = db.update_note(alice.id, note.id, UpdateNoteInput {
                content: Some("second draft".to_string()),
                ..Default::default()
            }).unwrap().unwrap();
            assert_eq!(same.version, 2);

            let versions = db.get_note_versions(note.id).unwrap();
            assert_eq!(versions.len(), 1);
            assert_eq!(versions[0].version, 1);
            assert_eq!(versions[0].content, "Body of draft");
        }

        it "pages with tag and archive filters" {
            create_test_note(&db, alice.id, "w1", &["work"]);
            create_test_note(&db, alice.id, "w2", &["work", "urgent"]);
            create_test_note(&db, alice.id, "p1", &["personal"]);
            let archived = create_test_note(&db, alice.id, "w3", &["work"]);
            db.update_note(alice.id, archived.id, UpdateNoteInput {
                is_archived: Some(true),
                ..Default::default()
            }).unwrap();

            let filter = NoteFilter {
                tags: vec!["work".to_string()],
                ..Default::default()
            };
            let (page, total) = db.get_notes_page(alice.id, &filter, 1, 0).unwrap();
            assert_eq!(total, 2);
            assert_eq!(page.len(), 1);

            let archived_filter = NoteFilter {
                archived: true,
                ..Default::default()
            };
            let (page, total) = db.get_notes_page(alice.id, &archived_filter, 10, 0).unwrap();
            assert_eq!(total, 1);
            assert_eq!(page[0].title, "w3");
        }

        it "resolves only links owned by the caller" {
            let task = create_test_task(&db, alice.id, "linked task");
            let foreign = create_test_task(&db, bob.id, "bob's task");
            let other = create_test_note(&db, alice.id, "other", &[]);
            let note = db.create_note(alice.id, CreateNoteInput {
                title: "hub".to_string(),
                linked_tasks: Some(vec![task.id, foreign.id, Uuid::new_v4()]),
                linked_notes: Some(vec![other.id]),
                ..Default::default()
            }).unwrap();

            let links = db.get_note_links(alice.id, &note).unwrap();
            assert_eq!(links.tasks, vec![LinkedEntity { id: task.id, title: "linked task".to_string() }]);
            assert_eq!(links.notes, vec![LinkedEntity { id: other.id, title: "other".to_string() }]);
        }

        it "treats another user's note as missing" {
            let note = create_test_note(&db, alice.id, "secret", &[]);
            assert!(db.get_owned_note(bob.id, note.id).unwrap().is_none());
            assert!(!db.delete_note(bob.id, note.id).unwrap());
            assert!(db.get_note(note.id).unwrap().is_some());
        }
    }

    describe "projects" {
        it "makes the creator an accepted owner" {
            let project = create_test_project(&db, alice.id, "Launch");
            let collaborators = db.get_collaborators(project.id).unwrap();

            assert_eq!(collaborators.len(), 1);
            assert_eq!(collaborators[0].user_id, alice.id);
            assert_eq!(collaborators[0].role, CollaboratorRole::Owner);
            assert_eq!(collaborators[0].status, CollaboratorStatus::Accepted);
        }

        it "reports zero progress without tasks" {
            let project = create_test_project(&db, alice.id, "Empty");
            let progress = db.get_project_progress(project.id, Utc::now()).unwrap();

            assert_eq!(progress.total_tasks, 0);
            assert_eq!(progress.progress_percentage, 0.0);
        }

        it "rolls up task counts" {
            let project = create_test_project(&db, alice.id, "Launch");
            let now = Utc::now();
            let mut ids = Vec::new();
            for (title, due) in [("a", Some(now - Duration::days(1))), ("b", None), ("c", None)] {
                let task = db.create_task(alice.id, CreateTaskInput {
                    title: title.to_string(),
                    due_date: due,
                    project_id: Some(project.id),
                    ..Default::default()
                }).unwrap();
                ids.push(task.id);
            }
            db.update_task(alice.id, ids[1], UpdateTaskInput {
                status: Some(TaskStatus::Completed),
                ..Default::default()
            }).unwrap();
            db.update_task(alice.id, ids[2], UpdateTaskInput {
                status: Some(TaskStatus::InProgress),
                ..Default::default()
            }).unwrap();

            let progress = db.get_project_progress(project.id, now).unwrap();
            assert_eq!(progress.total_tasks, 3);
            assert_eq!(progress.completed_tasks, 1);
            assert_eq!(progress.in_progress_tasks, 1);
            assert_eq!(progress.pending_tasks, 1);
            assert_eq!(progress.overdue_tasks, 1);
            assert_eq!(progress.progress_percentage, 33.33);
        }

        it "hides projects until the invitation is accepted" {
            let project = create_test_project(&db, alice.id, "Shared");
            db.add_collaborator(project.id, bob.id, CollaboratorRole::Editor, alice.id).unwrap();

            assert!(db.get_project_role(bob.id, project.id).unwrap().is_none());
            let (_, total) = db.get_projects_page(bob.id, &ProjectFilter::default(), 10, 0).unwrap();
            assert_eq!(total, 0);

            db.update_collaborator(project.id, bob.id, UpdateCollaboratorInput {
                status: Some(CollaboratorStatus::Accepted),
                ..Default::default()
            }).unwrap();

            let (_, role) = db.get_project_role(bob.id, project.id).unwrap().expect("No access");
            assert_eq!(role, CollaboratorRole::Editor);
            let (page, _) = db.get_projects_page(bob.id, &ProjectFilter::default(), 10, 0).unwrap();
            assert_eq!(page[0].id, project.id);
        }

        it "filters archived projects and children" {
            let parent = create_test_project(&db, alice.id, "Parent");
            let child = db.create_project(alice.id, CreateProjectInput {
                name: "Child".to_string(),
                parent_project_id: Some(parent.id),
                ..Default::default()
            }).unwrap();
            let archived = db.create_project(alice.id, CreateProjectInput {
                name: "Old child".to_string(),
                parent_project_id: Some(parent.id),
                ..Default::default()
            }).unwrap();
            db.set_project_archived(archived.id, true).unwrap();

            let children = db.get_child_projects(alice.id, parent.id).unwrap();
            assert_eq!(children.len(), 1);
            assert_eq!(children[0].id, child.id);

            let (_, active) = db.get_projects_page(alice.id, &ProjectFilter::default(), 10, 0).unwrap();
            assert_eq!(active, 2);
            let all = ProjectFilter { include_archived: true, ..Default::default() };
            let (_, total) = db.get_projects_page(alice.id, &all, 10, 0).unwrap();
            assert_eq!(total, 3);
        }

        it "clears task references when deleted" {
            let project = create_test_project(&db, alice.id, "Doomed");
            let task = db.create_task(alice.id, CreateTaskInput {
                title: "survivor".to_string(),
                project_id: Some(project.id),
                ..Default::default()
            }).unwrap();

            assert!(db.delete_project(project.id).unwrap());
            let task = db.get_task(task.id).unwrap().expect("Task should survive");
            assert!(task.project_id.is_none());
        }
    }

    describe "chat" {
        it "returns the most recent messages oldest first" {
            for i in 0..5 {
                db.create_message(alice.id, ChatRole::User, &format!("m{i}"), "gpt-4").unwrap();
            }

            let recent: Vec<String> = db
                .get_recent_messages(alice.id, 3)
                .unwrap()
                .into_iter()
                .map(|m| m.content)
                .collect();
            assert_eq!(recent, vec!["m2", "m3", "m4"]);
        }

        it "clears only the owner's history" {
            db.create_message(alice.id, ChatRole::User, "hi", "gpt-4").unwrap();
            db.create_message(bob.id, ChatRole::User, "hello", "gpt-4").unwrap();

            assert_eq!(db.delete_messages(alice.id).unwrap(), 1);
            assert_eq!(db.delete_messages(alice.id).unwrap(), 0);
            assert_eq!(db.get_messages(bob.id).unwrap().len(), 1);
        }
    }

    describe "file database" {
        it "persists across reopen" {
            let dir = tempfile::tempdir().expect("Failed to create temp dir");
            let path = dir.path().join("nested").join("vectal.db");

            {
                let file_db = Database::open(path.clone()).expect("Failed to open");
                file_db.migrate().expect("Failed to migrate");
                create_test_user(&file_db, "carol@example.com");
            }

            let reopened = Database::open(path).expect("Failed to reopen");
            reopened.migrate().expect("Migrations should be idempotent");
            assert!(reopened.get_user_by_email("carol@example.com").unwrap().is_some());
        }

        it "serializes concurrent note edits" {
            let dir = tempfile::tempdir().expect("Failed to create temp dir");
            let file_db = Database::open(dir.path().join("vectal.db")).expect("Failed to open");
            file_db.migrate().expect("Failed to migrate");
            let carol = create_test_user(&file_db, "carol@example.com");
            let note = create_test_note(&file_db, carol.id, "Draft", &[]);

            std::thread::scope(|scope| {
                for writer in 0..4 {
                    let handle = file_db.clone();
                    scope.spawn(move || {
                        for edit in 0..25 {
                            let input = UpdateNoteInput {
                                content: Some(format!("writer {writer} edit {edit}")),
                                ..Default::default()
                            };
                            handle
                                .update_note(carol.id, note.id, input)
                                .expect("Concurrent edit failed")
                                .expect("Note should exist");
                        }
                    });
                }
            });

            let stored = file_db.get_note(note.id).unwrap().unwrap();
            assert_eq!(stored.version, 101);

            let versions: Vec<i64> = file_db
                .get_note_versions(note.id)
                .unwrap()
                .into_iter()
                .map(|v| v.version)
                .collect();
            assert_eq!(versions, (1..=100).collect::<Vec<i64>>());
        }

        it "keeps both sides of concurrent task edits" {
            let dir = tempfile::tempdir().expect("Failed to create temp dir");
            let file_db = Database::open(dir.path().join("vectal.db")).expect("Failed to open");
            file_db.migrate().expect("Failed to migrate");
            let carol = create_test_user(&file_db, "carol@example.com");

            for round in 0..20 {
                let task = create_test_task(&file_db, carol.id, &format!("Task {round}"));

                std::thread::scope(|scope| {
                    let renamer = file_db.clone();
                    scope.spawn(move || {
                        let input = UpdateTaskInput {
                            title: Some("Renamed".to_string()),
                            ..Default::default()
                        };
                        renamer.update_task(carol.id, task.id, input).unwrap();
                    });

                    let escalator = file_db.clone();
                    scope.spawn(move || {
                        let input = UpdateTaskInput {
                            priority: Some(TaskPriority::High),
                            ..Default::default()
                        };
                        escalator.update_task(carol.id, task.id, input).unwrap();
                    });
                });

                let stored = file_db.get_task(task.id).unwrap().unwrap();
                assert_eq!(stored.title, "Renamed");
                assert_eq!(stored.priority, TaskPriority::High);
            }
        }
    }
}
