use sagaflow_core::{new_task, BoxError, ExecContext, Task};
use sagaflow_engine::{Flow, FlowBuilder, LineFlow, UnorderedFlow};
use serde_json::json;
use std::sync::{Arc, Mutex};

type EventLog = Arc<Mutex<Vec<String>>>;

fn booking_task(name: &str, events: &EventLog, fails: bool) -> Arc<dyn Task> {
    let do_name = name.to_string();
    let undo_name = name.to_string();
    let do_events = Arc::clone(events);
    let undo_events = Arc::clone(events);
    let task = new_task(name, move |_ctx| {
        let events = Arc::clone(&do_events);
        let name = do_name.clone();
        async move {
            events.lock().unwrap().push(format!("book {}", name));
            if fails {
                return Err(BoxError::from(format!("{} unavailable", name)));
            }
            Ok(())
        }
    })
    .with_compensation(move |_ctx| {
        let events = Arc::clone(&undo_events);
        let name = undo_name.clone();
        async move {
            events.lock().unwrap().push(format!("cancel {}", name));
            Ok(())
        }
    });
    Arc::new(task)
}

#[tokio::test]
async fn test_trip_booking_rolls_back_in_reverse_on_failure() {
    let events: EventLog = Arc::new(Mutex::new(Vec::new()));

    let mut trip = LineFlow::new("trip");
    trip.add_tasks([
        booking_task("flight", &events, false),
        booking_task("hotel", &events, false),
        booking_task("payment", &events, true),
    ]);

    let ctx = ExecContext::new();
    let err = trip.execute(&ctx).await.unwrap_err();

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            "book flight",
            "book hotel",
            "book payment",
            "cancel hotel",
            "cancel flight"
        ]
    );
    assert_eq!(
        err.to_string(),
        "FlowError(name=trip, errs=[TaskError(name=payment, doerr=payment unavailable)])"
    );
}

#[tokio::test]
async fn test_context_payload_survives_rollback() {
    let reserve = new_task("flight", |ctx: ExecContext| async move {
        ctx.set("itinerary", json!({ "from": "OSL", "to": "NRT" })).await?;
        Ok(())
    });
    let charge = new_task("payment", |_ctx| async { Err(BoxError::from("card declined")) });

    let mut trip = LineFlow::new("trip");
    trip.add_tasks([
        Arc::new(reserve) as Arc<dyn Task>,
        Arc::new(charge) as Arc<dyn Task>,
    ]);

    let ctx = ExecContext::new();
    trip.execute(&ctx).await.unwrap_err();

    let itinerary = ctx.get_value("itinerary").await.unwrap();
    assert_eq!(itinerary["to"], "NRT");
}

#[tokio::test]
async fn test_failed_sibling_unwinds_whole_reservation_group() {
    let events: EventLog = Arc::new(Mutex::new(Vec::new()));

    let mut reservations = UnorderedFlow::new("reservations").with_undo_all_tasks(true);
    reservations.add_tasks([
        booking_task("flight", &events, false),
        booking_task("hotel", &events, false),
    ]);

    let mut trip = FlowBuilder::new().undo_all_tasks(true).line_flow("trip");
    trip.add_task(Arc::new(reservations));
    trip.add_task(booking_task("payment", &events, true));

    let ctx = ExecContext::new();
    let err = trip.execute(&ctx).await.unwrap_err();

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            "book flight",
            "book hotel",
            "book payment",
            "cancel flight",
            "cancel hotel"
        ]
    );
    assert!(err.to_string().contains("TaskError(name=payment"));
}
