//! Engine tests over in-memory snapshots.

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::{
  Error,
  config::Thresholds,
  household::DestroyOptions,
  membership::{Membership, family_id},
  operations::{
    AssignMainPerson, Context, ConvertSecondaryToFamily, CreateRole,
    JoinHousehold, JoinSecondarySection, LeaveSecondarySection, Operation,
    PromotePendingRegistration, RemoveRole, SwapPrimarySecondary, SwitchPrimarySection,
    SyncHousehold, TerminateMembership, TerminateOn, UndoTermination, check, prepare,
  },
  person::{Group, Person},
  role::{Category, NewRole, Role, RoleKind, far_future, yesterday},
  snapshot::{ChangeSet, Snapshot},
  validation::{ErrorKey, Field, ValidationContext, ValidationErrors, audit},
};

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn d(y: i32, m: u32, day: u32) -> NaiveDate { NaiveDate::from_ymd_opt(y, m, day).unwrap() }

fn today() -> NaiveDate { d(2025, 3, 15) }

fn person(name: &str, birthday: Option<NaiveDate>, household: Option<&str>) -> Person {
  Person {
    person_id:          Uuid::new_v4(),
    name:               name.into(),
    birthday,
    household_key:      household.map(str::to_owned),
    main_person:        false,
    newsletter_opt_in:  false,
    fundraising_opt_in: false,
    created_at:         Utc::now(),
  }
}

fn adult(name: &str, household: Option<&str>) -> Person {
  person(name, Some(d(1990, 5, 1)), household)
}

fn group(name: &str) -> Group {
  let id = Uuid::new_v4();
  Group { group_id: id, layer_id: id, name: name.into(), requires_approval: false }
}

fn role(
  p: &Person,
  g: &Group,
  kind: RoleKind,
  category: Category,
  start: NaiveDate,
  end: NaiveDate,
) -> Role {
  NewRole {
    person_id: p.person_id,
    group_id:  g.group_id,
    kind,
    category:  Some(category),
    start_on:  Some(start),
    end_on:    Some(end),
  }
  .build(g.layer_id, Utc::now())
}

fn year_role(p: &Person, g: &Group, kind: RoleKind, category: Category) -> Role {
  role(p, g, kind, category, d(2025, 1, 1), d(2025, 12, 31))
}

struct World {
  snapshot:   Snapshot,
  thresholds: Thresholds,
}

impl World {
  fn new(people: Vec<Person>, groups: Vec<Group>, roles: Vec<Role>) -> Self {
    Self {
      snapshot:   Snapshot::new(people, groups, roles, Vec::new()),
      thresholds: Thresholds::default(),
    }
  }

  fn plan<O: Operation>(&self, op: &O) -> crate::Result<ChangeSet> {
    let ctx = Context {
      snapshot:    &self.snapshot,
      today:       today(),
      now:         Utc::now(),
      thresholds:  &self.thresholds,
      mutation_id: Uuid::new_v4(),
    };
    prepare(op, &ctx)
  }

  fn commit<O: Operation>(&mut self, op: &O) -> ChangeSet {
    let changes = self.plan(op).expect("operation should be valid");
    self.snapshot = self.snapshot.apply(&changes);
    changes
  }

  fn errors<O: Operation>(&self, op: &O) -> Vec<ErrorKey> {
    match self.plan(op) {
      Err(Error::Invalid(errors)) => errors.into_iter().map(|e| e.key).collect(),
      Err(other) => panic!("unexpected error: {other}"),
      Ok(_) => Vec::new(),
    }
  }

  fn live_roles(&self, p: &Person) -> Vec<&Role> {
    self.snapshot.roles_of(p.person_id).filter(|r| !r.is_deleted()).collect()
  }
}

fn new_role(p: &Person, g: &Group, kind: RoleKind, category: Category) -> NewRole {
  NewRole {
    person_id: p.person_id,
    group_id:  g.group_id,
    kind,
    category:  Some(category),
    start_on:  Some(d(2025, 1, 1)),
    end_on:    Some(d(2025, 12, 31)),
  }
}

// ─── Household propagation ───────────────────────────────────────────────────

#[test]
fn family_primary_propagates_to_household_member() {
  let p = person("P", Some(d(1995, 1, 1)), Some("h"));
  let q = person("Q", Some(d(1997, 1, 1)), Some("h"));
  let u = group("U");
  let mut world = World::new(vec![p.clone(), q.clone()], vec![u.clone()], vec![]);

  world.commit(&CreateRole::new(new_role(&p, &u, RoleKind::PrimaryMembership, Category::Family)));

  let q_roles = world.live_roles(&q);
  assert_eq!(q_roles.len(), 1);
  let copied = q_roles[0];
  assert_eq!(copied.kind, RoleKind::PrimaryMembership);
  assert_eq!(copied.group_id, u.group_id);
  assert_eq!(copied.category, Some(Category::Family));
  assert_eq!(copied.start_on, Some(d(2025, 1, 1)));
  assert_eq!(copied.end_on, Some(d(2025, 12, 31)));
  assert!(world.snapshot.person(p.person_id).unwrap().main_person);
}

#[test]
fn propagation_skips_members_with_a_membership_and_too_young_members() {
  let p = adult("P", Some("h"));
  let q = adult("Q", Some("h"));
  let toddler = person("T", Some(d(2022, 1, 1)), Some("h"));
  let u = group("U");
  let other = group("Other");
  let q_own = year_role(&q, &other, RoleKind::PrimaryMembership, Category::Adult);
  let mut world = World::new(
    vec![p.clone(), q.clone(), toddler.clone()],
    vec![u.clone(), other],
    vec![q_own.clone()],
  );

  world.commit(&CreateRole::new(new_role(&p, &u, RoleKind::PrimaryMembership, Category::Family)));

  assert_eq!(world.live_roles(&q), vec![&q_own]);
  assert!(world.live_roles(&toddler).is_empty());
}

#[test]
fn third_adult_family_role_is_rejected() {
  let a = adult("A", Some("h"));
  let b = adult("B", Some("h"));
  let c = adult("C", Some("h"));
  let u = group("U");
  let world = World::new(
    vec![a.clone(), b.clone(), c.clone()],
    vec![u.clone()],
    vec![
      year_role(&a, &u, RoleKind::PrimaryMembership, Category::Family),
      year_role(&b, &u, RoleKind::PrimaryMembership, Category::Family),
    ],
  );

  let op = CreateRole::new(new_role(&c, &u, RoleKind::PrimaryMembership, Category::Family));
  let errors = world.errors(&op);
  assert!(errors.contains(&ErrorKey::TooManyAdultsInFamily { max: 2 }));
  assert_eq!(
    ErrorKey::TooManyAdultsInFamily { max: 2 }.to_string(),
    "too many adults in family, max 2"
  );

  // The import escape hatch skips household rules.
  assert!(world.plan(&CreateRole::import(op.role.clone())).is_ok());
}

#[test]
fn minors_do_not_count_towards_family_adults() {
  let a = adult("A", Some("h"));
  let b = adult("B", Some("h"));
  let kid = person("K", Some(d(2014, 6, 1)), Some("h"));
  let u = group("U");
  let world = World::new(
    vec![a.clone(), b.clone(), kid.clone()],
    vec![u.clone()],
    vec![
      year_role(&a, &u, RoleKind::PrimaryMembership, Category::Family),
      year_role(&b, &u, RoleKind::PrimaryMembership, Category::Family),
    ],
  );

  let op = CreateRole::new(new_role(&kid, &u, RoleKind::PrimaryMembership, Category::Family));
  assert!(world.plan(&op).is_ok());
}

#[test]
fn family_primary_in_a_different_group_is_rejected() {
  let a = adult("A", Some("h"));
  let b = adult("B", Some("h"));
  let u = group("U");
  let v = group("V");
  let world = World::new(
    vec![a.clone(), b.clone()],
    vec![u.clone(), v.clone()],
    vec![year_role(&a, &u, RoleKind::PrimaryMembership, Category::Family)],
  );

  let errors = world.errors(&CreateRole::new(new_role(
    &b,
    &v,
    RoleKind::PrimaryMembership,
    Category::Family,
  )));
  assert!(errors.contains(&ErrorKey::FamilySectionMismatch { expected: u.group_id }));
}

#[test]
fn ambiguous_family_section_is_an_integrity_error() {
  let a = adult("A", Some("h"));
  let b = adult("B", Some("h"));
  let u = group("U");
  let v = group("V");
  let world = World::new(
    vec![a.clone(), b.clone()],
    vec![u.clone(), v.clone()],
    vec![
      year_role(&a, &u, RoleKind::PrimaryMembership, Category::Family),
      year_role(&b, &v, RoleKind::PrimaryMembership, Category::Family),
    ],
  );

  let err = world.plan(&SyncHousehold::new("h")).unwrap_err();
  assert!(matches!(err, Error::AmbiguousFamilySection { .. }));
  assert!(err.is_integrity());
}

#[test]
fn joining_a_household_hands_out_the_family_membership() {
  let p = adult("P", Some("h"));
  let q = adult("Q", None);
  let u = group("U");
  let mut world = World::new(
    vec![p.clone(), q.clone()],
    vec![u.clone()],
    vec![year_role(&p, &u, RoleKind::PrimaryMembership, Category::Family)],
  );

  let op = JoinHousehold::new(q.person_id, "h");
  let changes = world.commit(&op);
  assert_eq!(changes.created().count(), 1);
  assert_eq!(world.live_roles(&q)[0].group_id, u.group_id);

  // Joining again is rejected rather than silently repeated.
  assert_eq!(world.errors(&op), vec![ErrorKey::AlreadyInHousehold]);
}

#[test]
fn assigning_main_person_clears_the_previous_one() {
  let mut p = adult("P", Some("h"));
  p.main_person = true;
  let q = adult("Q", Some("h"));
  let mut world = World::new(vec![p.clone(), q.clone()], vec![], vec![]);

  let changes = world.commit(&AssignMainPerson::new(q.person_id));
  assert_eq!(changes.people.len(), 2);
  assert!(!world.snapshot.person(p.person_id).unwrap().main_person);
  assert!(world.snapshot.person(q.person_id).unwrap().main_person);
}

// ─── Interval rules ──────────────────────────────────────────────────────────

#[test]
fn primary_roles_are_exclusive_club_wide() {
  let p = adult("P", None);
  let a = group("A");
  let b = group("B");
  let existing = year_role(&p, &a, RoleKind::PrimaryMembership, Category::Adult);
  let world = World::new(vec![p.clone()], vec![a.clone(), b.clone()], vec![existing.clone()]);

  let errors = world.errors(&CreateRole::new(new_role(
    &p,
    &b,
    RoleKind::PrimaryPendingRegistration,
    Category::Adult,
  )));
  assert_eq!(
    errors,
    vec![ErrorKey::OverlapsMembership {
      role_id:  existing.role_id,
      start_on: d(2025, 1, 1),
      end_on:   d(2025, 12, 31),
    }]
  );
}

#[test]
fn pending_conflicts_use_their_own_key() {
  let p = adult("P", None);
  let a = group("A");
  let pending = year_role(&p, &a, RoleKind::PrimaryPendingRegistration, Category::Adult);
  let world = World::new(vec![p.clone()], vec![a.clone()], vec![pending.clone()]);

  let errors = world.errors(&CreateRole::new(new_role(
    &p,
    &a,
    RoleKind::PrimaryMembership,
    Category::Adult,
  )));
  assert!(matches!(
    errors.as_slice(),
    [ErrorKey::OverlapsPendingRegistration { role_id, .. }] if *role_id == pending.role_id
  ));
}

#[test]
fn consecutive_primary_roles_do_not_conflict() {
  let p = adult("P", None);
  let a = group("A");
  let world = World::new(
    vec![p.clone()],
    vec![a.clone()],
    vec![year_role(&p, &a, RoleKind::PrimaryMembership, Category::Adult)],
  );

  let mut next = new_role(&p, &a, RoleKind::PrimaryMembership, Category::Adult);
  next.start_on = Some(d(2026, 1, 1));
  next.end_on = Some(d(2026, 12, 31));
  assert!(world.plan(&CreateRole::new(next)).is_ok());
}

#[test]
fn secondary_role_in_the_primary_layer_conflicts() {
  let p = adult("P", None);
  let a = group("A");
  let world = World::new(
    vec![p.clone()],
    vec![a.clone()],
    vec![year_role(&p, &a, RoleKind::PrimaryMembership, Category::Adult)],
  );

  let errors = world.errors(&CreateRole::new(new_role(
    &p,
    &a,
    RoleKind::SecondaryMembership,
    Category::Adult,
  )));
  assert!(matches!(errors.as_slice(), [ErrorKey::OverlapsMembership { .. }]));
}

#[test]
fn shortened_primary_no_longer_covers_secondary() {
  let p = adult("P", None);
  let a = group("A");
  let b = group("B");
  let primary = role(
    &p,
    &a,
    RoleKind::PrimaryMembership,
    Category::Adult,
    d(2020, 1, 1),
    d(2030, 12, 31),
  );
  let secondary = role(
    &p,
    &b,
    RoleKind::SecondaryMembership,
    Category::Adult,
    d(2025, 1, 1),
    d(2025, 6, 30),
  );
  let thresholds = Thresholds::default();

  let valid = Snapshot::new(
    vec![p.clone()],
    vec![a.clone(), b.clone()],
    vec![primary.clone(), secondary.clone()],
    vec![],
  );
  let ctx = ValidationContext { snapshot: &valid, today: today(), thresholds: &thresholds };
  assert!(audit(p.person_id, &ctx).is_empty());

  let mut shortened = primary.clone();
  shortened.end_on = Some(d(2025, 3, 1));
  let invalid = Snapshot::new(
    vec![p.clone()],
    vec![a, b],
    vec![shortened, secondary.clone()],
    vec![],
  );
  let ctx = ValidationContext { snapshot: &invalid, today: today(), thresholds: &thresholds };
  let findings = audit(p.person_id, &ctx);
  assert!(findings.iter().any(|(role_id, e)| {
    *role_id == secondary.role_id && e.key == ErrorKey::NotCoveredByPrimary
  }));
}

#[test]
fn membership_requires_birthday_and_minimum_age() {
  let nobody = person("N", None, None);
  let toddler = person("T", Some(d(2021, 1, 1)), None);
  let a = group("A");
  let world = World::new(vec![nobody.clone(), toddler.clone()], vec![a.clone()], vec![]);

  let errors = world.errors(&CreateRole::new(new_role(
    &nobody,
    &a,
    RoleKind::PrimaryMembership,
    Category::Adult,
  )));
  assert_eq!(errors, vec![ErrorKey::BirthdayMissing]);

  let errors = world.errors(&CreateRole::new(new_role(
    &toddler,
    &a,
    RoleKind::PrimaryMembership,
    Category::Youth,
  )));
  assert_eq!(errors, vec![ErrorKey::TooYoung { minimum_age: 6 }]);
}

#[test]
fn removing_a_primary_may_not_strand_its_secondaries() {
  let p = adult("P", None);
  let a = group("A");
  let b = group("B");
  let primary = year_role(&p, &a, RoleKind::PrimaryMembership, Category::Adult);
  let secondary = year_role(&p, &b, RoleKind::SecondaryMembership, Category::Adult);
  let mut world = World::new(
    vec![p.clone()],
    vec![a, b],
    vec![primary.clone(), secondary.clone()],
  );

  let keep_dependents = RemoveRole {
    role_id: primary.role_id,
    options: DestroyOptions { skip_dependent_roles: true, ..DestroyOptions::default() },
  };
  assert_eq!(world.errors(&keep_dependents), vec![ErrorKey::NotCoveredByPrimary]);

  world.commit(&RemoveRole::new(primary.role_id));
  assert!(world.live_roles(&p).is_empty());
  assert!(world.snapshot.role(secondary.role_id).unwrap().is_deleted());
}

// ─── Switch and swap ─────────────────────────────────────────────────────────

#[test]
fn switch_into_a_section_already_held_fails_but_swap_succeeds() {
  let p = adult("P", None);
  let a = group("A");
  let b = group("B");
  let primary = year_role(&p, &a, RoleKind::PrimaryMembership, Category::Adult);
  let secondary = year_role(&p, &b, RoleKind::SecondaryMembership, Category::Adult);
  let mut world = World::new(
    vec![p.clone()],
    vec![a.clone(), b.clone()],
    vec![primary.clone(), secondary.clone()],
  );

  let errors = world.errors(&SwitchPrimarySection::new(p.person_id, b.group_id, today()));
  assert_eq!(errors, vec![ErrorKey::AlreadyInSection]);

  world.commit(&SwapPrimarySecondary::new(p.person_id, secondary.role_id));
  let live = world.live_roles(&p);
  let primaries: Vec<_> = live.iter().filter(|r| r.is_primary()).collect();
  assert_eq!(primaries.len(), 1);
  assert_eq!(primaries[0].group_id, b.group_id);
  assert_eq!(primaries[0].start_on, Some(today()));
  let secondaries: Vec<_> = live.iter().filter(|r| r.is_secondary()).collect();
  assert_eq!(secondaries.len(), 1);
  assert_eq!(secondaries[0].group_id, a.group_id);
}

#[test]
fn switching_a_family_moves_every_member() {
  let p = adult("P", Some("h"));
  let q = adult("Q", Some("h"));
  let a = group("A");
  let b = group("B");
  let mut world = World::new(
    vec![p.clone(), q.clone()],
    vec![a.clone(), b.clone()],
    vec![
      year_role(&p, &a, RoleKind::PrimaryMembership, Category::Family),
      year_role(&q, &a, RoleKind::PrimaryMembership, Category::Family),
    ],
  );

  let changes = world.commit(&SwitchPrimarySection::new(p.person_id, b.group_id, today()));
  assert_eq!(changes.notifications.len(), 2);
  for member in [&p, &q] {
    let live = world.live_roles(member);
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].group_id, b.group_id);
    assert_eq!(live[0].category, Some(Category::Family));
    assert_eq!(live[0].end_on, Some(d(2025, 12, 31)));
  }
}

#[test]
fn switch_next_year_ends_the_old_role_on_new_years_eve() {
  let p = adult("P", None);
  let a = group("A");
  let b = group("B");
  let primary = role(
    &p,
    &a,
    RoleKind::PrimaryMembership,
    Category::Adult,
    d(2020, 1, 1),
    far_future(),
  );
  let mut world = World::new(vec![p.clone()], vec![a, b.clone()], vec![primary.clone()]);

  world.commit(&SwitchPrimarySection::new(p.person_id, b.group_id, d(2026, 1, 1)));
  let old = world.snapshot.role(primary.role_id).unwrap();
  assert_eq!(old.end_on, Some(d(2025, 12, 31)));
  assert!(!old.is_deleted());
}

/// P holds a primary in A and a secondary in a third section C, plus
/// whatever `extra` adds.
fn member_with_third_section(
  extra: impl FnOnce(&Person, &Group) -> Vec<Role>,
) -> (Person, Group, Group, World) {
  let p = adult("P", None);
  let a = group("A");
  let b = group("B");
  let c = group("C");
  let mut roles = vec![
    role(
      &p,
      &a,
      RoleKind::PrimaryMembership,
      Category::Adult,
      d(2020, 1, 1),
      d(2025, 12, 31),
    ),
    role(
      &p,
      &c,
      RoleKind::SecondaryMembership,
      Category::Adult,
      d(2024, 1, 1),
      d(2025, 12, 31),
    ),
  ];
  roles.extend(extra(&p, &b));
  let world = World::new(vec![p.clone()], vec![a, b.clone(), c.clone()], roles);
  (p, b, c, world)
}

fn assert_secondary_carried_over(world: &World, p: &Person, c: &Group, switch_on: NaiveDate) {
  let in_c: Vec<&Role> =
    world.live_roles(p).into_iter().filter(|r| r.group_id == c.group_id).collect();
  assert_eq!(in_c.len(), 2);
  let last_day = yesterday(switch_on);
  assert!(in_c.iter().any(|r| r.start_on == Some(d(2024, 1, 1)) && r.end_on == Some(last_day)));
  assert!(in_c.iter().any(|r| r.start_on == Some(switch_on) && r.end_on == Some(d(2025, 12, 31))));

  let ctx = ValidationContext {
    snapshot:   &world.snapshot,
    today:      today(),
    thresholds: &world.thresholds,
  };
  assert!(audit(p.person_id, &ctx).is_empty());
}

#[test]
fn switch_today_carries_a_third_section_along() {
  let (p, b, c, mut world) = member_with_third_section(|_, _| Vec::new());

  world.commit(&SwitchPrimarySection::new(p.person_id, b.group_id, today()));
  assert_secondary_carried_over(&world, &p, &c, today());
}

#[test]
fn switch_later_carries_a_third_section_along() {
  let (p, b, c, mut world) = member_with_third_section(|_, _| Vec::new());

  world.commit(&SwitchPrimarySection::new(p.person_id, b.group_id, d(2025, 6, 1)));
  assert_secondary_carried_over(&world, &p, &c, d(2025, 6, 1));
}

#[test]
fn swap_carries_a_third_section_along() {
  let (p, b, c, mut world) = member_with_third_section(|p, b| {
    vec![year_role(p, b, RoleKind::SecondaryMembership, Category::Adult)]
  });
  let in_b = world.live_roles(&p).into_iter().find(|r| r.group_id == b.group_id).unwrap().clone();

  world.commit(&SwapPrimarySecondary::new(p.person_id, in_b.role_id));
  let primary = world.live_roles(&p).into_iter().find(|r| r.is_active(today()) && r.is_primary());
  assert_eq!(primary.map(|r| r.group_id), Some(b.group_id));
  assert_secondary_carried_over(&world, &p, &c, today());
}

// ─── Secondary sections ──────────────────────────────────────────────────────

#[test]
fn joining_requires_an_active_primary() {
  let p = adult("P", None);
  let b = group("B");
  let world = World::new(vec![p.clone()], vec![b.clone()], vec![]);

  let errors = world.errors(&JoinSecondarySection::new(p.person_id, b.group_id));
  assert_eq!(errors, vec![ErrorKey::NoActivePrimary]);
}

#[test]
fn joining_a_section_requiring_approval_creates_a_pending_registration() {
  let p = adult("P", None);
  let a = group("A");
  let mut b = group("B");
  b.requires_approval = true;
  let mut world = World::new(
    vec![p.clone()],
    vec![a.clone(), b.clone()],
    vec![year_role(&p, &a, RoleKind::PrimaryMembership, Category::Adult)],
  );

  let changes = world.commit(&JoinSecondarySection::new(p.person_id, b.group_id));
  let created: Vec<_> = changes.created().collect();
  assert_eq!(created.len(), 1);
  assert_eq!(created[0].kind, RoleKind::SecondaryPendingRegistration);
  assert_eq!(created[0].category, Some(Category::Adult));
  assert_eq!(created[0].end_on, Some(d(2025, 12, 31)));

  let errors = world.errors(&JoinSecondarySection::new(p.person_id, b.group_id));
  assert_eq!(errors, vec![ErrorKey::AlreadyInSection]);
}

#[test]
fn leaving_a_secondary_section_at_end_of_year() {
  let p = adult("P", None);
  let a = group("A");
  let b = group("B");
  let secondary = year_role(&p, &b, RoleKind::SecondaryMembership, Category::Adult);
  let mut world = World::new(
    vec![p.clone()],
    vec![a.clone(), b],
    vec![year_role(&p, &a, RoleKind::PrimaryMembership, Category::Adult), secondary.clone()],
  );

  world.commit(&LeaveSecondarySection::new(secondary.role_id, TerminateOn::EndOfYear));
  let left = world.snapshot.role(secondary.role_id).unwrap();
  assert!(left.terminated);
  assert_eq!(left.end_on, Some(d(2025, 12, 31)));
  assert!(!left.is_deleted());
}

#[test]
fn converting_a_secondary_to_family_cascades_to_the_household() {
  let p = adult("P", Some("h"));
  let q = adult("Q", Some("h"));
  let a = group("A");
  let b = group("B");
  let secondary = year_role(&p, &b, RoleKind::SecondaryMembership, Category::Adult);
  let mut world = World::new(
    vec![p.clone(), q.clone()],
    vec![a.clone(), b.clone()],
    vec![
      year_role(&p, &a, RoleKind::PrimaryMembership, Category::Family),
      year_role(&q, &a, RoleKind::PrimaryMembership, Category::Family),
      secondary.clone(),
    ],
  );

  world.commit(&ConvertSecondaryToFamily::new(secondary.role_id));
  assert!(world.snapshot.role(secondary.role_id).unwrap().is_family());
  let q_secondary: Vec<_> =
    world.live_roles(&q).into_iter().filter(|r| r.is_secondary()).collect();
  assert_eq!(q_secondary.len(), 1);
  assert_eq!(q_secondary[0].group_id, b.group_id);
  assert!(q_secondary[0].is_family());
}

// ─── Termination and undo ────────────────────────────────────────────────────

#[test]
fn terminating_a_family_membership_reaches_every_member() {
  let p = adult("P", Some("h"));
  let q = adult("Q", Some("h"));
  let kid = person("K", Some(d(2015, 2, 1)), Some("h"));
  let a = group("A");
  let b = group("B");
  let p_primary = year_role(&p, &a, RoleKind::PrimaryMembership, Category::Family);
  let q_primary = year_role(&q, &a, RoleKind::PrimaryMembership, Category::Family);
  let honorary = role(
    &p,
    &a,
    RoleKind::HonoraryMembership,
    Category::Adult,
    d(2010, 1, 1),
    far_future(),
  );
  let mut world = World::new(
    vec![p.clone(), q.clone(), kid.clone()],
    vec![a.clone(), b.clone()],
    vec![
      p_primary.clone(),
      q_primary.clone(),
      year_role(&kid, &a, RoleKind::PrimaryMembership, Category::Family),
      year_role(&p, &b, RoleKind::SecondaryMembership, Category::Family),
      honorary.clone(),
    ],
  );

  let mut op = TerminateMembership::new(p_primary.role_id, TerminateOn::EndOfYear);
  op.subscribe_newsletter = true;
  let changes = world.commit(&op);

  assert_eq!(changes.journal.len(), 5);
  assert_eq!(changes.notifications.len(), 3);
  for member in [&p, &q, &kid] {
    let primary = world.live_roles(member).into_iter().find(|r| r.is_primary()).unwrap();
    assert!(primary.terminated);
    assert_eq!(primary.mutation_id, Some(changes.mutation_id));
  }
  // Honorary roles go at once, not at the end of the year.
  let removed_honorary = world.snapshot.role(honorary.role_id).unwrap();
  assert!(!removed_honorary.terminated);
  assert!(removed_honorary.is_deleted());
  assert_eq!(removed_honorary.end_on, Some(d(2025, 3, 14)));
  assert!(world.snapshot.person(p.person_id).unwrap().newsletter_opt_in);

  // Undo from any member restores the whole batch.
  world.commit(&UndoTermination::new(q_primary.role_id));
  for member in [&p, &q, &kid] {
    assert!(world.live_roles(member).iter().all(|r| !r.terminated && r.mutation_id.is_none()));
  }
  let restored_honorary = world.snapshot.role(honorary.role_id).unwrap();
  assert_eq!(restored_honorary.end_on, Some(far_future()));
  assert!(!restored_honorary.is_deleted());

  // A second undo is rejected, not silently accepted.
  assert_eq!(
    world.errors(&UndoTermination::new(p_primary.role_id)),
    vec![ErrorKey::NotTerminated]
  );
}

#[test]
fn immediate_termination_soft_deletes_and_undo_restores() {
  let p = adult("P", None);
  let a = group("A");
  let primary = role(
    &p,
    &a,
    RoleKind::PrimaryMembership,
    Category::Adult,
    d(2020, 1, 1),
    far_future(),
  );
  let mut world = World::new(vec![p.clone()], vec![a], vec![primary.clone()]);

  world.commit(&TerminateMembership::new(primary.role_id, TerminateOn::Now));
  let terminated = world.snapshot.role(primary.role_id).unwrap().clone();
  assert!(terminated.terminated);
  assert_eq!(terminated.end_on, Some(d(2025, 3, 14)));
  assert!(terminated.is_deleted());

  world.commit(&UndoTermination::new(primary.role_id));
  let restored = world.snapshot.role(primary.role_id).unwrap();
  assert_eq!(restored.end_on, primary.end_on);
  assert_eq!(restored.terminated, primary.terminated);
  assert_eq!(restored.deleted_at, primary.deleted_at);
}

#[test]
fn terminating_twice_is_rejected() {
  let p = adult("P", None);
  let a = group("A");
  let primary = year_role(&p, &a, RoleKind::PrimaryMembership, Category::Adult);
  let mut world = World::new(vec![p], vec![a], vec![primary.clone()]);

  let op = TerminateMembership::new(primary.role_id, TerminateOn::EndOfYear);
  world.commit(&op);
  assert_eq!(world.errors(&op), vec![ErrorKey::AlreadyTerminated]);
}

#[test]
fn undo_without_a_journaled_mutation_fails() {
  let p = adult("P", None);
  let a = group("A");
  let mut imported = year_role(&p, &a, RoleKind::PrimaryMembership, Category::Adult);
  imported.terminated = true;
  let world = World::new(vec![p], vec![a], vec![imported.clone()]);

  let err = world.plan(&UndoTermination::new(imported.role_id)).unwrap_err();
  assert!(matches!(err, Error::MutationNotFound(id) if id == imported.role_id));
}

// ─── Promotion ───────────────────────────────────────────────────────────────

#[test]
fn promoting_a_family_registration_confirms_the_household() {
  let p = adult("P", Some("h"));
  let q = adult("Q", Some("h"));
  let a = group("A");
  let pending_p = role(
    &p,
    &a,
    RoleKind::PrimaryPendingRegistration,
    Category::Family,
    d(2025, 3, 1),
    d(2025, 12, 31),
  );
  let pending_q = role(
    &q,
    &a,
    RoleKind::PrimaryPendingRegistration,
    Category::Family,
    d(2025, 3, 1),
    d(2025, 12, 31),
  );
  let mut world = World::new(
    vec![p.clone(), q.clone()],
    vec![a.clone()],
    vec![pending_p.clone(), pending_q.clone()],
  );

  let changes = world.commit(&PromotePendingRegistration::new(pending_p.role_id));
  assert_eq!(changes.created().count(), 2);
  for member in [&p, &q] {
    let live = world.live_roles(member);
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].kind, RoleKind::PrimaryMembership);
    assert_eq!(live[0].start_on, Some(today()));
    assert_eq!(live[0].end_on, Some(d(2025, 12, 31)));
  }
}

#[test]
fn promoting_a_membership_is_rejected() {
  let p = adult("P", None);
  let a = group("A");
  let primary = year_role(&p, &a, RoleKind::PrimaryMembership, Category::Adult);
  let world = World::new(vec![p], vec![a], vec![primary.clone()]);

  assert_eq!(
    world.errors(&PromotePendingRegistration::new(primary.role_id)),
    vec![ErrorKey::NotPending]
  );
}

// ─── Dry runs ────────────────────────────────────────────────────────────────

#[test]
fn check_reports_without_touching_the_snapshot() {
  let p = adult("P", None);
  let b = group("B");
  let world = World::new(vec![p.clone()], vec![b.clone()], vec![]);
  let ctx = Context {
    snapshot:    &world.snapshot,
    today:       today(),
    now:         Utc::now(),
    thresholds:  &world.thresholds,
    mutation_id: Uuid::new_v4(),
  };

  let op = JoinSecondarySection::new(p.person_id, b.group_id);
  let first = check(&op, &ctx).unwrap();
  let second = check(&op, &ctx).unwrap();
  assert_eq!(first, second);
  assert_eq!(first.len(), 1);
  assert_eq!(world.snapshot.roles().count(), 0);
}

// ─── Membership facade ───────────────────────────────────────────────────────

#[test]
fn facade_answers_from_loaded_roles() {
  let mut main = adult("M", Some("h"));
  main.main_person = true;
  let partner = adult("Q", Some("h"));
  let former = adult("F", None);
  let a = group("A");
  let b = group("B");

  let mut old = role(
    &former,
    &a,
    RoleKind::PrimaryMembership,
    Category::Adult,
    d(2018, 1, 1),
    d(2019, 12, 31),
  );
  old.deleted_at = Some(Utc::now());
  let snapshot = Snapshot::new(
    vec![main.clone(), partner.clone(), former.clone()],
    vec![a.clone(), b.clone()],
    vec![
      year_role(&main, &a, RoleKind::PrimaryMembership, Category::Family),
      year_role(&partner, &a, RoleKind::PrimaryMembership, Category::Family),
      year_role(&partner, &b, RoleKind::SecondaryPendingRegistration, Category::Adult),
      old,
    ],
    vec![],
  );

  let m = Membership::new(&main, snapshot.loaded_roles(main.person_id), today());
  assert!(m.is_family().unwrap());
  assert_eq!(m.family_id().unwrap(), Some(family_id("h")));
  assert_eq!(m.family_id().unwrap().as_deref(), Some("Fh"));
  assert!(m.is_invoiceable().unwrap());
  assert!(!m.is_terminated().unwrap());

  let q = Membership::new(&partner, snapshot.loaded_roles(partner.person_id), today());
  assert_eq!(q.pending_secondary_roles().unwrap().len(), 1);
  assert!(q.active_secondary_roles().unwrap().is_empty());
  // The pending adult registration is invoiced to the partner.
  assert!(q.is_invoiceable().unwrap());

  let f = Membership::new(&former, snapshot.loaded_roles(former.person_id), today());
  assert!(f.active_primary_role().unwrap().is_none());
  assert!(f.is_member_anytime().unwrap());
  assert!(!f.is_invoiceable().unwrap());
  let status = f.status().unwrap();
  assert!(status.member_anytime);
  assert!(status.family_id.is_none());
}

// ─── Wire format ─────────────────────────────────────────────────────────────

#[test]
fn validation_errors_serialize_as_key_and_parameters() {
  let mut errors = ValidationErrors::new();
  errors.add(Field::Person, ErrorKey::TooManyAdultsInFamily { max: 2 });
  errors.add(Field::EndOn, ErrorKey::EndsBeforeStart);

  let json = serde_json::to_value(&errors).unwrap();
  assert_eq!(
    json,
    serde_json::json!([
      { "field": "person", "key": "too_many_adults_in_family", "max": 2 },
      { "field": "end_on", "key": "ends_before_start" },
    ])
  );
  assert_eq!(
    errors.to_string(),
    "person too many adults in family, max 2; end_on ends before start"
  );
}
