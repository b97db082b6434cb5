mod common;

use common::*;
use mention_responder::human::{HumanSimulator, PauseToken, TimingProfile, TypingOptions};
use mention_responder::surface::Key;
use std::sync::Arc;
use std::time::Duration;

const INPUT: &str = "textarea";

fn simulator(surface: &Arc<MockSurface>, profile: TimingProfile, pause: PauseToken) -> HumanSimulator {
    HumanSimulator::with_seed(surface.clone(), pause, profile, 42)
}

#[tokio::test(start_paused = true)]
async fn test_fast_profile_uses_forced_clicks_and_bulk_fill() {
    init_logger();
    let surface = MockSurface::new();
    let input = surface.add("", node(INPUT));
    let sim = simulator(&surface, TimingProfile::Fast, PauseToken::new());

    sim.click(mention_responder::surface::ElementRef(input)).await.unwrap();
    let typos = sim
        .type_text(mention_responder::surface::ElementRef(input), "hello there", &TypingOptions::default())
        .await
        .unwrap();
    assert_eq!(typos, 0);
    assert_eq!(
        surface.events(),
        vec![Event::ForceClick(input), Event::Fill(input, "hello there".into())]
    );

    let waited = sim.wait(2000, 4000).await;
    assert_eq!(waited, Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn test_realistic_click_moves_then_presses() {
    init_logger();
    let surface = MockSurface::new();
    let button = surface.add("", node("button").text("Reply"));
    let sim = simulator(&surface, TimingProfile::Realistic, PauseToken::new());

    sim.click(mention_responder::surface::ElementRef(button)).await.unwrap();
    let events = surface.events();
    let moves = events.iter().filter(|e| matches!(e, Event::MouseMove(_))).count();
    assert!(moves >= 15, "expected a full reach path, got {} moves", moves);

    let down = events.iter().position(|e| matches!(e, Event::MouseDown(_))).unwrap();
    let up = events.iter().position(|e| matches!(e, Event::MouseUp(_))).unwrap();
    assert!(down < up);
    assert_eq!(events.last(), Some(&Event::Click(button)));
    assert!(!events.contains(&Event::ForceClick(button)));

    // Press and release happen where the pointer ended up, inside the element.
    let (Event::MouseDown(p), Event::MouseMove(last)) = (&events[down], &events[down - 1]) else {
        panic!("press should follow the final move");
    };
    assert_eq!(p, last);
}

#[tokio::test(start_paused = true)]
async fn test_realistic_typing_ends_with_exact_text() {
    init_logger();
    let surface = MockSurface::new();
    let input = surface.add("", node(INPUT));
    let sim = simulator(&surface, TimingProfile::Realistic, PauseToken::new());
    let text = "Love this shot, the colours are unreal!";
    let options = TypingOptions {
        typo_chance: 0.3,
        ..Default::default()
    };

    let typos = sim
        .type_text(mention_responder::surface::ElementRef(input), text, &options)
        .await
        .unwrap();
    println!("⌨️  {} typo(s) corrected", typos);
    assert_eq!(surface.value_of(input).as_deref(), Some(text));

    let backspaces = surface
        .events()
        .iter()
        .filter(|e| matches!(e, Event::Key(Key::Backspace)))
        .count();
    assert_eq!(backspaces, typos);
}

#[tokio::test(start_paused = true)]
async fn test_pause_holds_typing_until_resume() {
    init_logger();
    let surface = MockSurface::new();
    let input = surface.add("", node(INPUT));
    let pause = PauseToken::new();
    let sim = Arc::new(simulator(&surface, TimingProfile::Realistic, pause.clone()));

    pause.request_pause();
    let task = {
        let sim = Arc::clone(&sim);
        tokio::spawn(async move {
            sim.type_text(mention_responder::surface::ElementRef(input), "ok", &TypingOptions::default().without_typos())
                .await
        })
    };

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(pause.is_suspended());
    assert!(surface.events().is_empty(), "nothing may happen while paused");

    pause.resume();
    task.await.unwrap().unwrap();
    assert!(!pause.is_suspended());
    assert_eq!(surface.value_of(input).as_deref(), Some("ok"));
}

#[test]
fn test_unpaused_check_returns_immediately() {
    let pause = PauseToken::new();
    assert!(!tokio_test::block_on(pause.check_for_pause()));
}
