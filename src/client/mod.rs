pub mod slurm_client;
