//! Chassis and logical topology inventory.

use super::{collect_with_handler, CollectionContext, Collector};
use crate::backend::{Chassis, LogicalSwitch, LogicalSwitchPort};
use crate::errors::ExporterError;
use crate::observability::registry::{sample, Sample};

/// Publish `ovn_chassis_info`.
pub async fn collect_chassis(ctx: CollectionContext<'_>) -> Result<(), ExporterError> {
    collect_with_handler(
        ctx,
        Collector::Chassis,
        ctx.backend.list_chassis(),
        |chassis: Vec<Chassis>| {
            ctx.metrics.chassis_info.publish(chassis.into_iter().map(|c| {
                sample([c.hostname, c.uuid, c.name, c.ip_address], 1.0)
            }));
        },
        || ctx.metrics.chassis_info.clear(),
    )
    .await
}

/// Publish the `ovn_logical_switch_*` families.
pub async fn collect_logical_switches(ctx: CollectionContext<'_>) -> Result<(), ExporterError> {
    let m = ctx.metrics;
    collect_with_handler(
        ctx,
        Collector::LogicalSwitch,
        ctx.backend.list_logical_switches(),
        |switches: Vec<LogicalSwitch>| {
            let mut info: Vec<Sample> = Vec::with_capacity(switches.len());
            let mut ports_num: Vec<Sample> = Vec::with_capacity(switches.len());
            let mut bindings: Vec<Sample> = Vec::new();
            let mut external_ids: Vec<Sample> = Vec::new();
            let mut tunnel_keys: Vec<Sample> = Vec::with_capacity(switches.len());

            for ls in &switches {
                info.push(sample([&ls.uuid, &ls.name], 1.0));
                ports_num.push(sample([&ls.uuid, &ls.name], ls.ports.len() as f64));
                for port in &ls.ports {
                    bindings.push(sample([&ls.uuid, port, &ls.name], 1.0));
                }
                for (key, value) in &ls.external_ids {
                    external_ids.push(sample([&ls.uuid, key, value, &ls.name], 1.0));
                }
                tunnel_keys.push(sample([&ls.uuid, &ls.name], ls.tunnel_key as f64));
            }

            m.logical_switch_info.publish(info);
            m.logical_switch_ports_num.publish(ports_num);
            m.logical_switch_port_binding.publish(bindings);
            m.logical_switch_external_id.publish(external_ids);
            m.logical_switch_tunnel_key.publish(tunnel_keys);
        },
        || {
            m.logical_switch_info.clear();
            m.logical_switch_ports_num.clear();
            m.logical_switch_port_binding.clear();
            m.logical_switch_external_id.clear();
            m.logical_switch_tunnel_key.clear();
        },
    )
    .await
}

/// Publish `ovn_logical_switch_port_info` and `ovn_logical_switch_port_tunnel_key`.
pub async fn collect_logical_switch_ports(ctx: CollectionContext<'_>) -> Result<(), ExporterError> {
    let m = ctx.metrics;
    collect_with_handler(
        ctx,
        Collector::LogicalSwitchPort,
        ctx.backend.list_logical_switch_ports(),
        |ports: Vec<LogicalSwitchPort>| {
            let mut info: Vec<Sample> = Vec::with_capacity(ports.len());
            let mut tunnel_keys: Vec<Sample> = Vec::with_capacity(ports.len());

            for port in &ports {
                let (mac, ip) = port.mac_and_ip();
                info.push(sample(
                    [
                        &port.uuid,
                        &port.name,
                        &port.chassis_id,
                        &port.switch_name,
                        &port.datapath_id,
                        &port.port_binding_id,
                        &mac,
                        &ip,
                    ],
                    1.0,
                ));
                tunnel_keys.push(sample(
                    [&port.uuid, &port.switch_name, &port.name],
                    port.tunnel_key as f64,
                ));
            }

            m.logical_switch_port_info.publish(info);
            m.logical_switch_port_tunnel_key.publish(tunnel_keys);
        },
        || {
            m.logical_switch_port_info.clear();
            m.logical_switch_port_tunnel_key.clear();
        },
    )
    .await
}
