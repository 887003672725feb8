mod communication;
mod settings;

use brain::RobotBrain;
use communication::CommunicationLayer;
use kinematics::Pose;
use log::{error, info};
use settings::Settings;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let settings = match std::env::args().nth(1) {
        Some(path) => Settings::load(&path)?,
        None => Settings::default(),
    };

    info!("Initializing {} arm controller...", settings.robot);
    let chain = settings.robot.build()?;
    let mut brain = RobotBrain::new(chain, settings.solver.clone());
    let cancel = brain.cancel_token();

    // watch keeps only the newest target: bursts coalesce while a solve runs
    let (target_tx, mut target_rx) = watch::channel(None::<Pose>);

    let comms = if settings.transport.enabled {
        let comms = CommunicationLayer::new(&settings.transport).await?;
        let tx = target_tx.clone();
        comms
            .subscribe_target(move |pose| {
                cancel.cancel();
                tx.send_replace(Some(pose));
            })
            .await?;
        info!("Listening for targets on {}", settings.transport.target_key);
        Some(comms)
    } else {
        let targets: Vec<Pose> = settings.demo_targets.iter().map(|t| t.to_pose()).collect();
        let interval = Duration::from_millis(settings.demo_interval_ms);
        tokio::spawn(async move {
            for target in targets {
                info!("Demo target: {:?}", target.translation.vector);
                target_tx.send_replace(Some(target));
                sleep(interval).await;
            }
        });
        None
    };

    loop {
        tokio::select! {
            changed = target_rx.changed() => {
                if changed.is_err() {
                    info!("No more targets.");
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down.");
                break;
            }
        }

        let Some(target) = *target_rx.borrow_and_update() else {
            continue;
        };
        brain.set_target(target);

        match tokio::task::block_in_place(|| brain.update()) {
            Ok(Some(report)) => info!(
                "Solve finished: converged={} error={:.6} sweeps={}",
                report.converged, report.final_error, report.iterations
            ),
            Ok(None) => info!("Already at target."),
            Err(e) => {
                error!("Solve failed: {e}");
                continue;
            }
        }

        let joints = brain.joint_states();
        let positions: Vec<f64> = joints.iter().map(|joint| joint.position).collect();
        info!("Joint command: {:?}", positions);

        if let Some(comms) = &comms {
            let names = brain.chain().joint_names();
            let params = brain.chain().joint_params();
            if let Err(e) = comms.publish_joint_command(&names, &params, &joints).await {
                error!("Failed to publish joint command: {e}");
            }
        }
    }

    Ok(())
}
