//! WaitGroup scheduling, ordering and error propagation against the
//! in-process engine.

mod common;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use common::{assert_idle, runtime, sleep};
use tandem_flow::{Context, FlowError, FlowMode, WaitGroup};

type Events = Rc<RefCell<Vec<String>>>;

fn events() -> Events {
  Rc::new(RefCell::new(Vec::new()))
}

fn push(events: &Events, event: impl Into<String>) {
  events.borrow_mut().push(event.into());
}

#[test]
fn test_callbacks_without_engine_calls() {
  let (runtime, engine) = runtime();
  let group: WaitGroup<&str> = WaitGroup::new(&runtime, Context::new(1).unwrap());

  let first = group.add(|_ctx| async { Ok("1") }).unwrap();
  let second = group.add(|_ctx| async { Ok("2") }).unwrap();

  assert_eq!(
    group.wait_results().unwrap(),
    vec![(first, "1"), (second, "2")]
  );
  assert_eq!(engine.pushes(), 0);
}

#[test]
fn test_results_follow_completion_order() {
  let (runtime, engine) = runtime();
  let group: WaitGroup<&str> = WaitGroup::new(&runtime, Context::new(2).unwrap());

  for (name, ms) in [("1", 10), ("2", 1)] {
    let runtime = runtime.clone();
    group
      .add(move |ctx| async move {
        sleep(&runtime, &ctx, ms).await?;
        Ok(name)
      })
      .unwrap();
  }

  let values: Vec<&str> = group
    .wait_results()
    .unwrap()
    .into_iter()
    .map(|(_, value)| value)
    .collect();

  assert_eq!(values, vec!["2", "1"]);
  drop(group);
  assert_idle(&engine);
}

#[test]
fn test_callbacks_interleave() {
  let (runtime, engine) = runtime();
  let events = events();
  let group: WaitGroup<()> = WaitGroup::new(&runtime, Context::new(2).unwrap());

  for (name, first, second) in [("1", 10, 30), ("2", 20, 40)] {
    let runtime = runtime.clone();
    let events = events.clone();
    group
      .add(move |ctx| async move {
        push(&events, format!("{name}:start"));
        sleep(&runtime, &ctx, first).await?;
        push(&events, format!("{name}:woke"));
        sleep(&runtime, &ctx, second).await?;
        push(&events, format!("{name}:finish"));
        Ok(())
      })
      .unwrap();
  }

  assert_eq!(group.wait_all().unwrap(), 2);
  assert_eq!(
    *events.borrow(),
    vec!["1:start", "2:start", "1:woke", "2:woke", "1:finish", "2:finish"]
  );
  drop(group);
  assert_idle(&engine);
}

#[test]
fn test_break_leaves_work_pending() {
  let (runtime, engine) = runtime();
  let group: WaitGroup<&str> = WaitGroup::new(&runtime, Context::new(3).unwrap());

  for (name, ms) in [("slow", 2_000), ("fast", 1)] {
    let runtime = runtime.clone();
    group
      .add(move |ctx| async move {
        sleep(&runtime, &ctx, ms).await?;
        Ok(name)
      })
      .unwrap();
  }

  let (_, first) = group.iterate().next().unwrap().unwrap();
  assert_eq!(first, "fast");
  assert_eq!(group.pending(), 1);

  let other: WaitGroup<&str> = WaitGroup::new(&runtime, Context::new(1).unwrap());
  let inner = runtime.clone();
  other
    .add(move |ctx| async move {
      sleep(&inner, &ctx, 1).await?;
      Ok("other")
    })
    .unwrap();
  assert_eq!(other.wait_results().unwrap().len(), 1);
  assert_eq!(group.pending(), 1);

  let started = Instant::now();
  drop(group);
  drop(other);
  assert_idle(&engine);
  assert!(started.elapsed() < Duration::from_millis(1_000));
}

#[test]
fn test_add_while_iterating() {
  let (runtime, engine) = runtime();
  let group: WaitGroup<u32> = WaitGroup::new(&runtime, Context::new(2).unwrap());

  let inner = runtime.clone();
  group
    .add(move |ctx| async move {
      sleep(&inner, &ctx, 1).await?;
      Ok(1)
    })
    .unwrap();

  let mut seen = Vec::new();
  for completion in group.iterate() {
    let (_, value) = completion.unwrap();
    seen.push(value);
    if value == 1 {
      let inner = runtime.clone();
      group
        .add(move |ctx| async move {
          sleep(&inner, &ctx, 1).await?;
          Ok(2)
        })
        .unwrap();
    }
  }

  assert_eq!(seen, vec![1, 2]);
  drop(group);
  assert_idle(&engine);
}

#[test]
fn test_callback_error_ends_iteration() {
  let (runtime, engine) = runtime();
  let group: WaitGroup<(), anyhow::Error> = WaitGroup::new(&runtime, Context::new(2).unwrap());

  let slow = runtime.clone();
  group
    .add(move |ctx| async move {
      sleep(&slow, &ctx, 1_000).await?;
      Ok(())
    })
    .unwrap();
  let failing = runtime.clone();
  group
    .add(move |ctx| async move {
      sleep(&failing, &ctx, 1).await?;
      Err(anyhow!("boom"))
    })
    .unwrap();

  let completions: Vec<_> = group.iterate().collect();

  assert_eq!(completions.len(), 1);
  let err = completions.into_iter().next().unwrap().unwrap_err();
  assert_eq!(err.to_string(), "boom");

  let started = Instant::now();
  drop(group);
  assert_idle(&engine);
  assert!(started.elapsed() < Duration::from_millis(900));
}

#[test]
fn test_engine_error_reaches_callback() {
  let (runtime, engine) = runtime();
  let group: WaitGroup<String> = WaitGroup::new(&runtime, Context::new(1).unwrap());

  let inner = runtime.clone();
  group
    .add(move |ctx| async move {
      match sleep(&inner, &ctx, -1).await {
        Err(FlowError::Task { message }) => Ok(format!("caught: {message}")),
        Err(e) => Err(e),
        Ok(()) => Ok("no error".to_string()),
      }
    })
    .unwrap();

  let results = group.wait_results().unwrap();

  assert_eq!(
    results[0].1,
    "caught: sleep: milliseconds must be greater than zero"
  );
  drop(group);
  assert_idle(&engine);
}

#[test]
fn test_nested_wait_group() {
  let (runtime, engine) = runtime();
  let events = events();
  let outer: WaitGroup<&str> = WaitGroup::new(&runtime, Context::new(3).unwrap());
  let started = Instant::now();

  let sibling = runtime.clone();
  outer
    .add(move |ctx| async move {
      sleep(&sibling, &ctx, 100).await?;
      Ok("sibling")
    })
    .unwrap();

  let nested = runtime.clone();
  let nested_events = events.clone();
  outer
    .add(move |ctx| async move {
      let own_flow = nested.current_flow().key().to_string();
      let inner: WaitGroup<u32> = WaitGroup::new(&nested, ctx);
      for n in 1..=2 {
        let runtime = nested.clone();
        let events = nested_events.clone();
        inner.add(move |ctx| async move {
          push(&events, format!("inner:{n}:start"));
          sleep(&runtime, &ctx, 60).await?;
          push(&events, format!("inner:{n}:finish"));
          Ok(n)
        })?;
      }
      assert_eq!(inner.wait_all()?, 2);
      assert_eq!(nested.current_flow().key(), own_flow);
      Ok("nested")
    })
    .unwrap();

  let values: Vec<&str> = outer
    .wait_results()
    .unwrap()
    .into_iter()
    .map(|(_, value)| value)
    .collect();
  let elapsed = started.elapsed();

  assert_eq!(values, vec!["nested", "sibling"]);
  let events = events.borrow();
  assert!(events[..2].iter().all(|event| event.ends_with(":start")));
  assert!(events[2..].iter().all(|event| event.ends_with(":finish")));
  assert!(elapsed >= Duration::from_millis(100));
  assert!(elapsed < Duration::from_millis(160), "took {elapsed:?}");

  drop(outer);
  assert_idle(&engine);
}

#[test]
fn test_blocking_calls_inside_iteration() {
  let (runtime, engine) = runtime();
  let group: WaitGroup<u32> = WaitGroup::new(&runtime, Context::new(2).unwrap());

  for n in [1, 2] {
    let inner = runtime.clone();
    group
      .add(move |ctx| async move {
        sleep(&inner, &ctx, 2).await?;
        Ok(n)
      })
      .unwrap();
  }

  let ctx = Context::new(1).unwrap();
  let mut seen = 0;
  for completion in group.iterate() {
    completion.unwrap();
    assert_eq!(runtime.current_flow().mode(), FlowMode::Sync);
    runtime.block_on(sleep(&runtime, &ctx, 1)).unwrap();
    seen += 1;
  }

  assert_eq!(seen, 2);
  drop(group);
  assert_idle(&engine);
}

#[test]
fn test_exhausted_context_surfaces_as_task_error() {
  let (runtime, _engine) = runtime();
  let group: WaitGroup<()> = WaitGroup::new(&runtime, Context::new(1).unwrap());

  let inner = runtime.clone();
  group
    .add(move |ctx| async move {
      sleep(&inner, &ctx, 1_500).await?;
      Ok(())
    })
    .unwrap();

  let err = group.wait_all().unwrap_err();
  assert!(err.is_task());
  assert!(err.to_string().contains("timeout waiting for task completion"));
}

#[test]
fn test_concurrent_sleeps_in_one_callback() {
  let (runtime, engine) = runtime();
  let group: WaitGroup<Duration> = WaitGroup::new(&runtime, Context::new(2).unwrap());

  let inner = runtime.clone();
  group
    .add(move |ctx| async move {
      let started = Instant::now();
      let (slow, fast) = futures::join!(sleep(&inner, &ctx, 40), sleep(&inner, &ctx, 20));
      slow?;
      fast?;
      Ok(started.elapsed())
    })
    .unwrap();

  let results = group.wait_results().unwrap();

  assert_eq!(results.len(), 1);
  // Overlapping sleeps take less than their sum.
  assert!(results[0].1 >= Duration::from_millis(40));
  assert!(results[0].1 < Duration::from_millis(60), "took {:?}", results[0].1);
  drop(group);
  assert_idle(&engine);
}
