//! TraCI client: launches SUMO and drives it over its TCP control protocol.

pub mod protocol;

use std::env;
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::process::{Child, Command};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context};

use crate::config::RecorderConfig;
use protocol::{command, data_type, variable, Decoder};

const CONNECT_ATTEMPTS: u32 = 60;
const CONNECT_BACKOFF: Duration = Duration::from_millis(250);

/// Live connection to a SUMO process under TraCI control.
pub struct TraciConnection {
    stream: TcpStream,
    child: Option<Child>,
}

impl TraciConnection {
    /// Launches SUMO for the given scenario and connects to it.
    ///
    /// The simulator binary is resolved from the mandatory `SUMO_HOME`
    /// environment variable. SUMO needs a moment to open its control port,
    /// so the connect loop retries with a short backoff.
    pub fn start(cfg: &RecorderConfig) -> anyhow::Result<Self> {
        let binary = sumo_binary(cfg.gui)?;
        let port = free_port()?;

        let mut launch = Command::new(&binary);
        launch
            .arg("-c")
            .arg(&cfg.scenario)
            .arg("--step-length")
            .arg(cfg.step_length.to_string())
            .arg("--lateral-resolution")
            .arg(cfg.lateral_resolution.to_string())
            .arg("--remote-port")
            .arg(port.to_string());
        if cfg.gui {
            launch
                .arg("--delay")
                .arg(cfg.delay_ms.to_string())
                .arg("--start");
        }

        let mut child = launch
            .spawn()
            .with_context(|| format!("failed to launch {}", binary.display()))?;

        let stream = match connect(port) {
            Ok(stream) => stream,
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(err);
            }
        };

        Ok(Self {
            stream,
            child: Some(child),
        })
    }

    /// TraCI API version and simulator identification string.
    pub fn api_version(&mut self) -> anyhow::Result<(i32, String)> {
        let mut reply = self.exchange(command::GET_VERSION, Vec::new())?;
        let (id, mut payload) = reply.read_command()?;
        anyhow::ensure!(
            id == command::GET_VERSION,
            "unexpected reply command 0x{id:02x} to the version handshake"
        );
        let api = payload.read_i32()?;
        let software = payload.read_string()?;
        Ok((api, software))
    }

    /// Current simulated time [s].
    pub fn simulation_time(&mut self) -> anyhow::Result<f64> {
        let mut value = self.get_variable(
            command::GET_SIM_VARIABLE,
            command::RESPONSE_SIM_VARIABLE,
            variable::TIME,
            "",
        )?;
        expect_type(&mut value, data_type::DOUBLE)?;
        value.read_f64()
    }

    /// Vehicles currently present plus those still waiting to be inserted.
    pub fn min_expected_vehicles(&mut self) -> anyhow::Result<i32> {
        let mut value = self.get_variable(
            command::GET_SIM_VARIABLE,
            command::RESPONSE_SIM_VARIABLE,
            variable::MIN_EXPECTED_VEHICLES,
            "",
        )?;
        expect_type(&mut value, data_type::INTEGER)?;
        value.read_i32()
    }

    /// Identifiers of all vehicles active in the network.
    pub fn vehicle_ids(&mut self) -> anyhow::Result<Vec<String>> {
        let mut value = self.get_variable(
            command::GET_VEHICLE_VARIABLE,
            command::RESPONSE_VEHICLE_VARIABLE,
            variable::ID_LIST,
            "",
        )?;
        expect_type(&mut value, data_type::STRING_LIST)?;
        value.read_string_list()
    }

    /// Longitudinal speed of a vehicle [m/s].
    pub fn speed(&mut self, veh_id: &str) -> anyhow::Result<f64> {
        let mut value = self.get_variable(
            command::GET_VEHICLE_VARIABLE,
            command::RESPONSE_VEHICLE_VARIABLE,
            variable::SPEED,
            veh_id,
        )?;
        expect_type(&mut value, data_type::DOUBLE)?;
        value.read_f64()
    }

    /// Cartesian position of a vehicle [m].
    pub fn position(&mut self, veh_id: &str) -> anyhow::Result<(f64, f64)> {
        let mut value = self.get_variable(
            command::GET_VEHICLE_VARIABLE,
            command::RESPONSE_VEHICLE_VARIABLE,
            variable::POSITION,
            veh_id,
        )?;
        expect_type(&mut value, data_type::POSITION_2D)?;
        let x = value.read_f64()?;
        let y = value.read_f64()?;
        Ok((x, y))
    }

    /// Current acceleration of a vehicle [m/s^2].
    pub fn acceleration(&mut self, veh_id: &str) -> anyhow::Result<f64> {
        let mut value = self.get_variable(
            command::GET_VEHICLE_VARIABLE,
            command::RESPONSE_VEHICLE_VARIABLE,
            variable::ACCELERATION,
            veh_id,
        )?;
        expect_type(&mut value, data_type::DOUBLE)?;
        value.read_f64()
    }

    /// Advances the simulation by one step.
    pub fn simulation_step(&mut self) -> anyhow::Result<()> {
        let mut payload = Vec::new();
        protocol::put_f64(&mut payload, 0.0);
        let mut reply = self.exchange(command::SIM_STEP, payload)?;

        // The step reply carries subscription results; none are registered.
        if reply.remaining() >= 4 {
            let _ = reply.read_i32()?;
        }
        Ok(())
    }

    /// Sends the close command and reaps the simulator process.
    pub fn close(&mut self) -> anyhow::Result<()> {
        // SUMO may drop the socket before the close status lands.
        let _ = self.exchange(command::CLOSE, Vec::new());
        if let Some(mut child) = self.child.take() {
            let _ = child.wait();
        }
        Ok(())
    }

    fn exchange(&mut self, id: u8, payload: Vec<u8>) -> anyhow::Result<Decoder> {
        let framed = protocol::encode_command(id, &payload);
        protocol::write_message(&mut self.stream, &[framed])?;

        let body = protocol::read_message(&mut self.stream)?;
        let mut message = Decoder::new(body);
        protocol::check_status(&mut message, id)?;
        Ok(message)
    }

    fn get_variable(
        &mut self,
        get_cmd: u8,
        response_cmd: u8,
        var: u8,
        object_id: &str,
    ) -> anyhow::Result<Decoder> {
        let mut payload = Vec::new();
        protocol::put_u8(&mut payload, var);
        protocol::put_string(&mut payload, object_id);

        let mut reply = self.exchange(get_cmd, payload)?;
        let (id, mut body) = reply.read_command()?;
        anyhow::ensure!(
            id == response_cmd,
            "unexpected reply command 0x{id:02x} to get 0x{get_cmd:02x}"
        );

        let echoed = body.read_u8()?;
        anyhow::ensure!(
            echoed == var,
            "reply for variable 0x{echoed:02x}, requested 0x{var:02x}"
        );
        let _object = body.read_string()?;
        Ok(body)
    }
}

impl Drop for TraciConnection {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

#[cfg(test)]
impl TraciConnection {
    fn over(stream: TcpStream) -> Self {
        Self {
            stream,
            child: None,
        }
    }
}

fn expect_type(value: &mut Decoder, expected: u8) -> anyhow::Result<()> {
    let actual = value.read_u8()?;
    anyhow::ensure!(
        actual == expected,
        "unexpected TraCI payload type 0x{actual:02x}, expected 0x{expected:02x}"
    );
    Ok(())
}

fn sumo_binary(gui: bool) -> anyhow::Result<PathBuf> {
    let home = env::var_os("SUMO_HOME")
        .ok_or_else(|| anyhow::anyhow!("please declare the environment variable 'SUMO_HOME'"))?;
    let name = if gui { "sumo-gui" } else { "sumo" };
    let mut path = PathBuf::from(home);
    path.push("bin");
    path.push(name);
    Ok(path)
}

fn free_port() -> anyhow::Result<u16> {
    let listener =
        TcpListener::bind(("127.0.0.1", 0)).context("no free local port for TraCI")?;
    Ok(listener.local_addr()?.port())
}

fn connect(port: u16) -> anyhow::Result<TcpStream> {
    let mut last_err = None;
    for _ in 0..CONNECT_ATTEMPTS {
        match TcpStream::connect(("127.0.0.1", port)) {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(err) => {
                last_err = Some(err);
                thread::sleep(CONNECT_BACKOFF);
            }
        }
    }
    bail!(
        "sumo did not open its TraCI port {port} after {CONNECT_ATTEMPTS} attempts: {}",
        last_err.map(|e| e.to_string()).unwrap_or_default()
    );
}
